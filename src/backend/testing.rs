// Recording doubles for the graphics backend and the windowing layer.
//
// Both write into a shared journal so tests can assert on the global
// creation/destruction order, window included.

use super::api::{
    DeviceDesc, ExtensionInfo, GraphicsApi, InstanceDesc, LayerInfo, PhysicalAccelerator,
    SurfaceSupport,
};
use super::error::{Result, VkResultExt};
use crate::window::Windowing;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    Window,
    Instance,
    Surface,
    Device,
    Swapchain,
    ImageView(u64),
    ShaderModule(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created(Object),
    Destroyed(Object),
}

pub type Journal = Rc<RefCell<Vec<Event>>>;

/// Objects destroyed so far, in order.
pub fn destroyed(journal: &Journal) -> Vec<Object> {
    journal
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Destroyed(object) => Some(*object),
            Event::Created(_) => None,
        })
        .collect()
}

/// Objects created so far, in order.
pub fn created(journal: &Journal) -> Vec<Object> {
    journal
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Created(object) => Some(*object),
            Event::Destroyed(_) => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateInstance,
    CreateSurface,
    CreateDevice,
    CreateSwapchain,
    SwapchainImages,
    /// Fail the n-th image view creation (0 based).
    ImageView(usize),
    ShaderModule,
    WaitIdle,
}

pub fn accelerator(
    raw: u64,
    name: &str,
    device_type: vk::PhysicalDeviceType,
    queue_count: u32,
) -> PhysicalAccelerator {
    PhysicalAccelerator {
        handle: vk::PhysicalDevice::from_raw(raw),
        name: name.to_string(),
        vendor_id: 0x10de,
        device_id: 0x2204,
        device_type,
        api_version: vk::make_api_version(0, 1, 3, 0),
        driver_version: vk::make_api_version(0, 535, 0, 0),
        discrete_queue_priorities: 2,
        features: vk::PhysicalDeviceFeatures::default(),
        memory_types: vec![vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        }],
        memory_heaps: vec![vk::MemoryHeap {
            size: 4 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        }],
        queue_families: vec![vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS
                | vk::QueueFlags::COMPUTE
                | vk::QueueFlags::TRANSFER,
            queue_count,
            timestamp_valid_bits: 64,
            min_image_transfer_granularity: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
        }],
        extensions: vec![ExtensionInfo {
            name: "VK_KHR_swapchain".into(),
            spec_version: 70,
        }],
        layers: Vec::new(),
    }
}

pub fn surface_support(min_image_count: u32, max_image_count: u32) -> SurfaceSupport {
    SurfaceSupport {
        capabilities: vk::SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        },
        formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
    }
}

/// Swapchain creation parameters as seen by the backend.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainRequest {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub sharing_mode: vk::SharingMode,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
}

/// Image view creation parameters as seen by the backend.
#[derive(Debug, Clone, Copy)]
pub struct ViewRequest {
    pub image: vk::Image,
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub components: vk::ComponentMapping,
    pub subresource_range: vk::ImageSubresourceRange,
}

pub struct MockApi {
    journal: Journal,
    pub layers: Vec<LayerInfo>,
    pub accelerators: Vec<PhysicalAccelerator>,
    pub presentation_supported: bool,
    pub surface: SurfaceSupport,
    /// Images handed out per swapchain; `None` hands out exactly the
    /// requested minimum.
    pub swapchain_image_count: Option<u32>,
    pub fail: Option<FailPoint>,
    pub calls: Vec<&'static str>,
    pub instance_desc: Option<InstanceDesc>,
    pub device_desc: Option<DeviceDesc>,
    pub swapchain_request: Option<SwapchainRequest>,
    pub view_requests: Vec<ViewRequest>,
    pub shader_code: Vec<Vec<u32>>,
    images: Vec<vk::Image>,
    views_created: usize,
    next_handle: u64,
}

impl MockApi {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            layers: Vec::new(),
            accelerators: vec![accelerator(
                1,
                "Mock GPU",
                vk::PhysicalDeviceType::DISCRETE_GPU,
                4,
            )],
            presentation_supported: true,
            surface: surface_support(2, 8),
            swapchain_image_count: None,
            fail: None,
            calls: Vec::new(),
            instance_desc: None,
            device_desc: None,
            swapchain_request: None,
            view_requests: Vec::new(),
            shader_code: Vec::new(),
            images: Vec::new(),
            views_created: 0,
            next_handle: 0x1000,
        }
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|call| *call == name)
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&self, event: Event) {
        self.journal.borrow_mut().push(event);
    }

    fn fails(&self, point: FailPoint) -> bool {
        self.fail == Some(point)
    }
}

impl GraphicsApi for MockApi {
    fn instance_layers(&self) -> VkResult<Vec<LayerInfo>> {
        Ok(self.layers.clone())
    }

    fn instance_extensions(&self) -> VkResult<Vec<ExtensionInfo>> {
        Ok(vec![ExtensionInfo {
            name: "VK_KHR_surface".into(),
            spec_version: 25,
        }])
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        self.calls.push("create_instance");
        if self.fails(FailPoint::CreateInstance) {
            return Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER);
        }
        self.instance_desc = Some(desc.clone());
        self.record(Event::Created(Object::Instance));
        Ok(vk::Instance::from_raw(self.handle()))
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.record(Event::Destroyed(Object::Instance));
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.calls.push("create_surface");
        if self.fails(FailPoint::CreateSurface) {
            return Err(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR);
        }
        self.record(Event::Created(Object::Surface));
        Ok(vk::SurfaceKHR::from_raw(self.handle()))
    }

    fn destroy_surface(&mut self, _surface: vk::SurfaceKHR) {
        self.record(Event::Destroyed(Object::Surface));
    }

    fn enumerate_physical_devices(
        &self,
        _instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok(self.accelerators.iter().map(|gpu| gpu.handle).collect())
    }

    fn describe_physical_device(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<PhysicalAccelerator> {
        self.accelerators
            .iter()
            .find(|gpu| gpu.handle == physical_device)
            .cloned()
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    fn surface_support(
        &self,
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self.presentation_supported)
    }

    fn surface_capabilities(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<SurfaceSupport> {
        Ok(self.surface.clone())
    }

    fn create_device(
        &mut self,
        _physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        self.calls.push("create_device");
        if self.fails(FailPoint::CreateDevice) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        self.device_desc = Some(desc.clone());
        self.record(Event::Created(Object::Device));
        Ok(vk::Device::from_raw(self.handle()))
    }

    fn device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x100 + u64::from(family) * 0x10 + u64::from(index))
    }

    fn device_wait_idle(&self, _device: vk::Device) -> VkResult<()> {
        if self.fails(FailPoint::WaitIdle) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(())
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        self.record(Event::Destroyed(Object::Device));
    }

    fn create_swapchain(
        &mut self,
        _device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.calls.push("create_swapchain");
        if self.fails(FailPoint::CreateSwapchain) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.swapchain_request = Some(SwapchainRequest {
            min_image_count: info.min_image_count,
            format: info.image_format,
            color_space: info.image_color_space,
            extent: info.image_extent,
            array_layers: info.image_array_layers,
            sharing_mode: info.image_sharing_mode,
            pre_transform: info.pre_transform,
            composite_alpha: info.composite_alpha,
            present_mode: info.present_mode,
        });

        let count = self.swapchain_image_count.unwrap_or(info.min_image_count);
        self.images = (0..count)
            .map(|i| vk::Image::from_raw(0x9000 + u64::from(i)))
            .collect();

        self.record(Event::Created(Object::Swapchain));
        Ok(vk::SwapchainKHR::from_raw(self.handle()))
    }

    fn swapchain_images(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        if self.fails(FailPoint::SwapchainImages) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        Ok(self.images.clone())
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, _swapchain: vk::SwapchainKHR) {
        self.record(Event::Destroyed(Object::Swapchain));
    }

    fn create_image_view(
        &mut self,
        _device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        self.calls.push("create_image_view");
        let index = self.views_created;
        self.views_created += 1;
        if self.fails(FailPoint::ImageView(index)) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }

        self.view_requests.push(ViewRequest {
            image: info.image,
            view_type: info.view_type,
            format: info.format,
            components: info.components,
            subresource_range: info.subresource_range,
        });

        let raw = self.handle();
        self.record(Event::Created(Object::ImageView(raw)));
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        self.record(Event::Destroyed(Object::ImageView(view.as_raw())));
    }

    fn create_shader_module(
        &mut self,
        _device: vk::Device,
        code: &[u32],
    ) -> VkResult<vk::ShaderModule> {
        self.calls.push("create_shader_module");
        if self.fails(FailPoint::ShaderModule) {
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }
        self.shader_code.push(code.to_vec());

        let raw = self.handle();
        self.record(Event::Created(Object::ShaderModule(raw)));
        Ok(vk::ShaderModule::from_raw(raw))
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        self.record(Event::Destroyed(Object::ShaderModule(module.as_raw())));
    }
}

pub struct MockWindowing {
    journal: Journal,
    /// `should_close` turns true once this many polls happened.
    pub close_after_polls: usize,
    pub polls: usize,
    pub fail_window: bool,
}

impl MockWindowing {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            close_after_polls: 3,
            polls: 0,
            fail_window: false,
        }
    }
}

impl Windowing for MockWindowing {
    type Window = u64;

    fn create_window(&mut self, _width: u32, _height: u32, _title: &str) -> Result<u64> {
        if self.fail_window {
            return Err(super::error::RendererError::Window("no display".into()));
        }
        self.journal.borrow_mut().push(Event::Created(Object::Window));
        Ok(7)
    }

    fn poll_events(&mut self) {
        self.polls += 1;
    }

    fn should_close(&self, _window: &u64) -> bool {
        self.polls >= self.close_after_polls
    }

    fn destroy_window(&mut self, _window: u64) {
        self.journal.borrow_mut().push(Event::Destroyed(Object::Window));
    }

    fn required_presentation_extensions(&self) -> Result<Vec<CString>> {
        Ok(vec![CString::from(c"VK_KHR_surface")])
    }

    fn create_surface<A: GraphicsApi>(
        &self,
        api: &mut A,
        instance: vk::Instance,
        window: &u64,
    ) -> Result<vk::SurfaceKHR> {
        let display = RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0));
        let window = RawWindowHandle::Xlib(XlibWindowHandle::new(*window as _));
        api.create_surface(instance, display, window)
            .check("vkCreateSurfaceKHR")
    }
}
