// Windowing - platform window and surface creation
//
// The renderer drives the window through the `Windowing` trait. The winit
// implementation pumps the event loop by hand so the lifecycle keeps a
// plain poll / should-close loop on the main thread.

use crate::backend::api::GraphicsApi;
use crate::backend::error::{RendererError, Result, VkResultExt};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

/// What the renderer needs from the platform windowing layer.
pub trait Windowing {
    type Window;

    fn create_window(&mut self, width: u32, height: u32, title: &str) -> Result<Self::Window>;
    fn poll_events(&mut self);
    fn should_close(&self, window: &Self::Window) -> bool;
    fn destroy_window(&mut self, window: Self::Window);
    fn required_presentation_extensions(&self) -> Result<Vec<CString>>;
    fn create_surface<A: GraphicsApi>(
        &self,
        api: &mut A,
        instance: vk::Instance,
        window: &Self::Window,
    ) -> Result<vk::SurfaceKHR>;
}

#[derive(Default)]
struct WindowState {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    close_requested: bool,
    error: Option<String>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.pending.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

pub struct WinitWindowing {
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl WinitWindowing {
    pub fn new() -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| RendererError::Window(e.to_string()))?;
        Ok(Self {
            event_loop,
            state: WindowState::default(),
        })
    }

    fn window(&self, id: &WindowId) -> Result<&Window> {
        self.state
            .window
            .as_ref()
            .filter(|window| window.id() == *id)
            .ok_or_else(|| RendererError::Window(format!("unknown window {id:?}")))
    }

    fn pump(&mut self, timeout: Option<Duration>) -> PumpStatus {
        self.event_loop.pump_app_events(timeout, &mut self.state)
    }
}

impl Windowing for WinitWindowing {
    type Window = WindowId;

    fn create_window(&mut self, width: u32, height: u32, title: &str) -> Result<WindowId> {
        log::info!("Creating window: {}x{} ({})", width, height, title);

        // The window is created from `resumed`, which needs a pumped loop.
        self.state.pending = Some(
            Window::default_attributes()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false),
        );

        loop {
            if let PumpStatus::Exit(code) = self.pump(Some(Duration::ZERO)) {
                return Err(RendererError::Window(format!(
                    "event loop exited with code {code} before the window was created"
                )));
            }
            if let Some(error) = self.state.error.take() {
                return Err(RendererError::Window(error));
            }
            if let Some(window) = &self.state.window {
                return Ok(window.id());
            }
        }
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(_) = self.pump(None) {
            self.state.close_requested = true;
        }
    }

    fn should_close(&self, _window: &WindowId) -> bool {
        self.state.close_requested
    }

    fn destroy_window(&mut self, window: WindowId) {
        if self.window(&window).is_ok() {
            self.state.window = None;
            log::info!("Destroyed window");
        }
    }

    fn required_presentation_extensions(&self) -> Result<Vec<CString>> {
        let display = self
            .event_loop
            .display_handle()
            .map_err(|e| RendererError::Window(e.to_string()))?;

        let names = ash_window::enumerate_required_extensions(display.as_raw())
            .check("enumerate required surface extensions")?;

        // ash-window hands out pointers to static extension name constants.
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn create_surface<A: GraphicsApi>(
        &self,
        api: &mut A,
        instance: vk::Instance,
        window: &WindowId,
    ) -> Result<vk::SurfaceKHR> {
        let window = self.window(window)?;
        let display_handle = window
            .display_handle()
            .map_err(|e| RendererError::Window(e.to_string()))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| RendererError::Window(e.to_string()))?;

        api.create_surface(instance, display_handle.as_raw(), window_handle.as_raw())
            .check("vkCreateSurfaceKHR")
    }
}
