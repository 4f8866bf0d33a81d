// =============================================================================
// RENDERER LIFECYCLE
// =============================================================================
//
// Uninitialized -> WindowReady -> DeviceReady -> SwapchainReady
//   -> ShadersReady -> Running -> ShuttingDown -> Terminated
//
// Startup is strictly forward. A fatal error at any step jumps straight to
// ShuttingDown. Ownership is nested (instance > surface/device > swapchain
// and shaders) so teardown only ever touches what was actually created,
// newest first.

use crate::backend::api::GraphicsApi;
use crate::backend::device::{self, LogicalDeviceContext, REQUIRED_DEVICE_EXTENSIONS};
use crate::backend::diagnostics;
use crate::backend::error::{display_error, RendererError, VkResultExt};
use crate::backend::instance::create_instance;
use crate::backend::shader::{self, ShaderModule};
use crate::backend::swapchain::SwapchainState;
use crate::config::Config;
use crate::window::Windowing;
use ash::vk;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Uninitialized,
    WindowReady,
    DeviceReady,
    SwapchainReady,
    ShadersReady,
    Running,
    ShuttingDown,
    Terminated,
}

impl LifecycleState {
    fn next(self) -> Self {
        use LifecycleState::*;
        match self {
            Uninitialized => WindowReady,
            WindowReady => DeviceReady,
            DeviceReady => SwapchainReady,
            SwapchainReady => ShadersReady,
            ShadersReady => Running,
            Running => ShuttingDown,
            ShuttingDown | Terminated => Terminated,
        }
    }
}

/// Bootstrap stopped before reaching `Running`.
#[derive(Error, Debug)]
#[error("bootstrap halted at {reached:?}: {error}")]
pub struct BootstrapFailure {
    /// Last state that was fully reached.
    pub reached: LifecycleState,
    #[source]
    pub error: RendererError,
}

/// Everything parented by the logical device.
struct DeviceStack {
    context: LogicalDeviceContext,
    swapchain: Option<SwapchainState>,
    shaders: Vec<ShaderModule>,
}

impl DeviceStack {
    fn destroy<A: GraphicsApi>(self, api: &mut A) {
        for module in self.shaders.into_iter().rev() {
            module.destroy(api, &self.context);
        }
        if let Some(swapchain) = self.swapchain {
            swapchain.destroy(api, &self.context);
        }
        self.context.destroy(api);
    }
}

/// Everything parented by the instance.
struct GraphicsStack {
    instance: vk::Instance,
    surface: Option<vk::SurfaceKHR>,
    device: Option<DeviceStack>,
}

impl GraphicsStack {
    fn destroy<A: GraphicsApi>(self, api: &mut A) {
        if let Some(device) = self.device {
            device.destroy(api);
        }
        if let Some(surface) = self.surface {
            api.destroy_surface(surface);
            log::info!("Destroyed surface");
        }
        api.destroy_instance(self.instance);
        log::info!("Destroyed instance");
    }
}

/// Sole owner of the window and every graphics object.
pub struct Renderer<A: GraphicsApi, W: Windowing> {
    config: Config,
    api: A,
    windowing: W,
    state: LifecycleState,
    window: Option<W::Window>,
    graphics: Option<GraphicsStack>,
}

impl<A: GraphicsApi, W: Windowing> Renderer<A, W> {
    pub fn new(config: Config, api: A, windowing: W) -> Self {
        Self {
            config,
            api,
            windowing,
            state: LifecycleState::Uninitialized,
            window: None,
            graphics: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Drive startup until `Running`. On failure everything created so far
    /// is already torn down when this returns.
    pub fn bootstrap(&mut self) -> Result<(), BootstrapFailure> {
        if self.state > LifecycleState::Running {
            return Err(BootstrapFailure {
                reached: self.state,
                error: RendererError::Lifecycle("renderer has already been shut down"),
            });
        }

        while self.state < LifecycleState::Running {
            let step = match self.state {
                LifecycleState::Uninitialized => self.open_window(),
                LifecycleState::WindowReady => self.build_device(),
                LifecycleState::DeviceReady => self.build_swapchain(),
                LifecycleState::SwapchainReady => self.load_shaders(),
                _ => Ok(()),
            };

            if let Err(error) = step {
                let reached = self.state;
                log::error!("Bootstrap failed after {:?}: {}", reached, error);
                self.shutdown();
                return Err(BootstrapFailure { reached, error });
            }
            self.advance();
        }

        Ok(())
    }

    /// Poll events until the window asks to close, then shut down.
    pub fn run(&mut self) -> Result<(), RendererError> {
        if self.state != LifecycleState::Running {
            return Err(RendererError::Lifecycle("run requires a completed bootstrap"));
        }

        log::info!("Entering main loop");
        loop {
            self.windowing.poll_events();
            match &self.window {
                Some(window) if !self.windowing.should_close(window) => continue,
                _ => break,
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Release everything in reverse creation order. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.state == LifecycleState::Terminated {
            return;
        }
        self.enter(LifecycleState::ShuttingDown);

        if let Some(graphics) = self.graphics.take() {
            graphics.destroy(&mut self.api);
        }
        if let Some(window) = self.window.take() {
            self.windowing.destroy_window(window);
        }

        self.enter(LifecycleState::Terminated);
    }

    fn advance(&mut self) {
        self.enter(self.state.next());
    }

    fn enter(&mut self, state: LifecycleState) {
        if state != self.state {
            log::info!("Renderer state: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn open_window(&mut self) -> Result<(), RendererError> {
        let window = &self.config.window;
        let handle = self
            .windowing
            .create_window(window.width, window.height, &window.title)?;
        self.window = Some(handle);
        Ok(())
    }

    fn build_device(&mut self) -> Result<(), RendererError> {
        let verbose = self.config.debug.print_capabilities;
        let window = self
            .window
            .as_ref()
            .ok_or(RendererError::Lifecycle("device requested without a window"))?;

        let layers = self
            .api
            .instance_layers()
            .check("vkEnumerateInstanceLayerProperties")?;
        let extensions = self
            .api
            .instance_extensions()
            .check("vkEnumerateInstanceExtensionProperties")?;
        diagnostics::emit(&diagnostics::instance_report(&layers, &extensions), verbose);

        let required = self.windowing.required_presentation_extensions()?;
        let instance = create_instance(&mut self.api, &self.config.instance_settings(), &required)?;
        let graphics = self.graphics.insert(GraphicsStack {
            instance,
            surface: None,
            device: None,
        });

        let surface = self
            .windowing
            .create_surface(&mut self.api, instance, window)?;
        graphics.surface = Some(surface);

        let accelerators = device::enumerate_physical_accelerators(&self.api, instance)?;
        for accelerator in &accelerators {
            diagnostics::emit(&diagnostics::accelerator_report(accelerator), verbose);
        }

        let index = device::select(&accelerators, &self.config.device.accelerator)?;
        let chosen = &accelerators[index];
        log::info!("Selected graphics card {}: {}", index, chosen.name);

        let context = device::create_logical_device(
            &mut self.api,
            chosen,
            self.config.device.queue_count,
            &REQUIRED_DEVICE_EXTENSIONS,
        )?;
        log::info!("Retrieved {} device queue(s)", context.queues.len());
        graphics.device = Some(DeviceStack {
            context,
            swapchain: None,
            shaders: Vec::new(),
        });

        Ok(())
    }

    fn build_swapchain(&mut self) -> Result<(), RendererError> {
        let (surface, stack) = match &mut self.graphics {
            Some(GraphicsStack {
                surface: Some(surface),
                device: Some(stack),
                ..
            }) => (*surface, stack),
            _ => return Err(RendererError::Lifecycle("swapchain requested without a device")),
        };

        if !device::verify_presentation_support(&self.api, &stack.context, surface)? {
            return Err(RendererError::PresentationUnsupported);
        }

        let window = &self.config.window;
        let swapchain = SwapchainState::create(
            &mut self.api,
            &stack.context,
            surface,
            window.width,
            window.height,
            self.config.debug.print_capabilities,
        )?;
        log::info!(
            "Swapchain ready: {} images, {:?}, {}x{}",
            swapchain.image_count(),
            swapchain.format,
            swapchain.extent.width,
            swapchain.extent.height
        );
        stack.swapchain = Some(swapchain);

        Ok(())
    }

    fn load_shaders(&mut self) -> Result<(), RendererError> {
        let Some(stack) = self.graphics.as_mut().and_then(|g| g.device.as_mut()) else {
            return Err(RendererError::Lifecycle("shaders requested without a device"));
        };

        for path in self.config.shaders.paths() {
            match shader::load_from_file(&mut self.api, &stack.context, &path) {
                Ok(module) => stack.shaders.push(module),
                Err(e) if !e.is_fatal() => {
                    log::warn!("Skipping shader {}: {}", path.display(), e);
                    display_error(&e.to_string(), "Warning");
                }
                Err(e) => return Err(e),
            }
        }

        log::info!("Loaded {} shader module(s)", stack.shaders.len());
        Ok(())
    }
}

impl<A: GraphicsApi, W: Windowing> Drop for Renderer<A, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
