// Graphics backend seam
//
// Every blocking call the bootstrap makes into the graphics runtime goes
// through `GraphicsApi`. The production implementation is `AshApi`
// (backend/vulkan.rs); tests drive the same code with recording doubles.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CString;

/// A Vulkan layer as reported by the loader or a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    pub spec_version: u32,
    pub implementation_version: u32,
    pub description: String,
}

/// A Vulkan extension and its spec revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    pub spec_version: u32,
}

/// Immutable description of one enumerated GPU.
#[derive(Debug, Clone)]
pub struct PhysicalAccelerator {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub driver_version: u32,
    pub discrete_queue_priorities: u32,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_types: Vec<vk::MemoryType>,
    pub memory_heaps: Vec<vk::MemoryHeap>,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub extensions: Vec<ExtensionInfo>,
    pub layers: Vec<LayerInfo>,
}

impl PhysicalAccelerator {
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext.name == name)
    }

    /// Total size of all device-local heaps in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_heaps
            .iter()
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

/// What a surface supports on a given accelerator.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters for instance creation.
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub application_name: CString,
    pub application_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

/// Parameters for logical device creation (single queue family).
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub queue_family_index: u32,
    pub queue_priorities: Vec<f32>,
    pub extensions: Vec<CString>,
}

/// Blocking calls into the graphics runtime.
///
/// Handles passed back in must come from the same implementation.
pub trait GraphicsApi {
    fn instance_layers(&self) -> VkResult<Vec<LayerInfo>>;
    fn instance_extensions(&self) -> VkResult<Vec<ExtensionInfo>>;
    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(&self, instance: vk::Instance)
        -> VkResult<Vec<vk::PhysicalDevice>>;
    fn describe_physical_device(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<PhysicalAccelerator>;
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<SurfaceSupport>;

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device>;
    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;
    fn device_wait_idle(&self, device: vk::Device) -> VkResult<()>;
    fn destroy_device(&mut self, device: vk::Device);

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);

    fn create_image_view(
        &mut self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView);

    fn create_shader_module(
        &mut self,
        device: vk::Device,
        code: &[u32],
    ) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule);
}
