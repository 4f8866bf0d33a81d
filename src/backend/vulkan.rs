// Vulkan backend - GraphicsApi on top of ash
//
// Owns the loaded entry point plus the instance and device function
// tables. Only one instance and one logical device exist per process, so
// the handles passed in by callers are checked against the owned ones.

use super::api::{
    DeviceDesc, ExtensionInfo, GraphicsApi, InstanceDesc, LayerInfo, PhysicalAccelerator,
    SurfaceSupport,
};
use super::error::{RendererError, Result, VkResultExt};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

pub struct AshApi {
    entry: Entry,
    instance: Option<ash::Instance>,
    surface_loader: Option<ash::khr::surface::Instance>,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    device: Option<ash::Device>,
    swapchain_loader: Option<ash::khr::swapchain::Device>,
}

impl AshApi {
    /// Load the Vulkan library.
    pub fn load() -> Result<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| RendererError::Loading(format!("{e}. Is Vulkan installed?")))?;

        Ok(Self {
            entry,
            instance: None,
            surface_loader: None,
            debug_utils: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self, handle: vk::Instance) -> VkResult<&ash::Instance> {
        self.instance
            .as_ref()
            .filter(|instance| instance.handle() == handle)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn any_instance(&self) -> VkResult<&ash::Instance> {
        self.instance
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&ash::khr::surface::Instance> {
        self.surface_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self, handle: vk::Device) -> VkResult<&ash::Device> {
        self.device
            .as_ref()
            .filter(|device| device.handle() == handle)
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    fn swapchain_loader(&self, handle: vk::Device) -> VkResult<&ash::khr::swapchain::Device> {
        self.device(handle)?;
        self.swapchain_loader
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn setup_debug_messenger(
        &self,
        instance: &ash::Instance,
    ) -> VkResult<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(&self.entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }
}

impl GraphicsApi for AshApi {
    fn instance_layers(&self) -> VkResult<Vec<LayerInfo>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }?;
        Ok(layers.iter().map(layer_info).collect())
    }

    fn instance_extensions(&self) -> VkResult<Vec<ExtensionInfo>> {
        let extensions = unsafe { self.entry.enumerate_instance_extension_properties(None) }?;
        Ok(extensions.iter().map(extension_info).collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        if self.instance.is_some() {
            return Err(vk::Result::ERROR_TOO_MANY_OBJECTS);
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(&desc.application_name)
            .application_version(desc.application_version)
            .engine_name(&desc.engine_name)
            .engine_version(desc.engine_version)
            .api_version(desc.api_version);

        let extensions: Vec<_> = desc.extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layers: Vec<_> = desc.layers.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;

        let wants_debug_utils = desc
            .extensions
            .iter()
            .any(|ext| ext.as_c_str() == ash::ext::debug_utils::NAME);
        if wants_debug_utils {
            self.debug_utils = optional_messenger(self.setup_debug_messenger(&instance));
        }

        let handle = instance.handle();
        let surface_loader = ash::khr::surface::Instance::new(&self.entry, &instance);
        self.surface_loader = Some(surface_loader);
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        if self.instance(instance).is_err() {
            log::warn!("Ignoring destroy of unknown instance {:?}", instance);
            return;
        }

        self.surface_loader = None;
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = self.instance(instance)?;
        unsafe { ash_window::create_surface(&self.entry, instance, display, window, None) }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        match self.surface_loader() {
            Ok(loader) => unsafe { loader.destroy_surface(surface, None) },
            Err(_) => log::warn!("Surface {:?} outlived its instance", surface),
        }
    }

    fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        let instance = self.instance(instance)?;
        unsafe { instance.enumerate_physical_devices() }
    }

    fn describe_physical_device(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<PhysicalAccelerator> {
        let instance = self.any_instance()?;

        unsafe {
            let properties = instance.get_physical_device_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);
            let memory = instance.get_physical_device_memory_properties(physical_device);
            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);
            let extensions = instance.enumerate_device_extension_properties(physical_device)?;
            let layers = instance.enumerate_device_layer_properties(physical_device)?;

            Ok(PhysicalAccelerator {
                handle: physical_device,
                name: lossy(properties.device_name_as_c_str()),
                vendor_id: properties.vendor_id,
                device_id: properties.device_id,
                device_type: properties.device_type,
                api_version: properties.api_version,
                driver_version: properties.driver_version,
                discrete_queue_priorities: properties.limits.discrete_queue_priorities,
                features,
                memory_types: memory.memory_types[..memory.memory_type_count as usize].to_vec(),
                memory_heaps: memory.memory_heaps[..memory.memory_heap_count as usize].to_vec(),
                queue_families,
                extensions: extensions.iter().map(extension_info).collect(),
                layers: layers.iter().map(layer_info).collect(),
            })
        }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let loader = self.surface_loader()?;
        unsafe {
            loader.get_physical_device_surface_support(physical_device, queue_family_index, surface)
        }
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<SurfaceSupport> {
        let loader = self.surface_loader()?;
        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: loader.get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            })
        }
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> VkResult<vk::Device> {
        if self.device.is_some() {
            return Err(vk::Result::ERROR_TOO_MANY_OBJECTS);
        }
        let instance = self.any_instance()?;

        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(desc.queue_family_index)
            .queue_priorities(&desc.queue_priorities);

        let extensions: Vec<_> = desc.extensions.iter().map(|ext| ext.as_ptr()).collect();

        // No optional features are enabled.
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;

        let handle = device.handle();
        let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);
        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue {
        match self.device(device) {
            Ok(device) => unsafe { device.get_device_queue(family, index) },
            Err(_) => vk::Queue::null(),
        }
    }

    fn device_wait_idle(&self, device: vk::Device) -> VkResult<()> {
        unsafe { self.device(device)?.device_wait_idle() }
    }

    fn destroy_device(&mut self, device: vk::Device) {
        if self.device(device).is_err() {
            log::warn!("Ignoring destroy of unknown device {:?}", device);
            return;
        }

        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let loader = self.swapchain_loader(device)?;
        unsafe { loader.create_swapchain(info, None) }
    }

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let loader = self.swapchain_loader(device)?;
        unsafe { loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        match self.swapchain_loader(device) {
            Ok(loader) => unsafe { loader.destroy_swapchain(swapchain, None) },
            Err(_) => log::warn!("Swapchain {:?} outlived its device", swapchain),
        }
    }

    fn create_image_view(
        &mut self,
        device: vk::Device,
        info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        let device = self.device(device)?;
        unsafe { device.create_image_view(info, None) }
    }

    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView) {
        match self.device(device) {
            Ok(device) => unsafe { device.destroy_image_view(view, None) },
            Err(_) => log::warn!("Image view {:?} outlived its device", view),
        }
    }

    fn create_shader_module(
        &mut self,
        device: vk::Device,
        code: &[u32],
    ) -> VkResult<vk::ShaderModule> {
        let device = self.device(device)?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { device.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule) {
        match self.device(device) {
            Ok(device) => unsafe { device.destroy_shader_module(module, None) },
            Err(_) => log::warn!("Shader module {:?} outlived its device", module),
        }
    }
}

impl Drop for AshApi {
    fn drop(&mut self) {
        if self.device.is_some() || self.instance.is_some() {
            log::warn!("Vulkan backend dropped with live objects; the lifecycle owner should have torn them down");
        }
    }
}

/// Validation keeps running without a messenger; only its log output is lost.
fn optional_messenger<T>(result: VkResult<T>) -> Option<T> {
    result
        .check("vkCreateDebugUtilsMessengerEXT")
        .map_err(|e| log::warn!("Continuing without debug messenger: {}", e))
        .ok()
}

fn lossy<E>(name: std::result::Result<&CStr, E>) -> String {
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn layer_info(layer: &vk::LayerProperties) -> LayerInfo {
    LayerInfo {
        name: lossy(layer.layer_name_as_c_str()),
        spec_version: layer.spec_version,
        implementation_version: layer.implementation_version,
        description: lossy(layer.description_as_c_str()),
    }
}

fn extension_info(extension: &vk::ExtensionProperties) -> ExtensionInfo {
    ExtensionInfo {
        name: lossy(extension.extension_name_as_c_str()),
        spec_version: extension.spec_version,
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
