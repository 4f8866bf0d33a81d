// Vulkan instance creation
//
// Binds the instance to the application/engine identity and enables the
// platform presentation extensions. Validation is best effort: a missing
// layer is reported and the instance is created without it.

use super::api::{GraphicsApi, InstanceDesc};
use super::diagnostics::format_version;
use super::error::{display_error, RendererError, Result, VkResultExt};
use ash::vk;
use std::ffi::{CStr, CString};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Identity and options the instance is created with.
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    pub enable_validation: bool,
}

pub fn create_instance<A: GraphicsApi>(
    api: &mut A,
    settings: &InstanceSettings,
    required_extensions: &[CString],
) -> Result<vk::Instance> {
    log::info!("Application name: {}", settings.application_name);
    log::info!("Application version: {}", format_version(settings.application_version));
    log::info!("Engine name: {}", settings.engine_name);
    log::info!("Engine version: {}", format_version(settings.engine_version));

    log::info!("Required presentation extensions:");
    for extension in required_extensions {
        log::info!("  {}", extension.to_string_lossy());
    }

    let mut extensions = required_extensions.to_vec();
    let mut layers = Vec::new();

    if settings.enable_validation {
        if validation_layer_available(api)? {
            layers.push(VALIDATION_LAYER.to_owned());

            let debug_utils = ash::ext::debug_utils::NAME;
            let available = api
                .instance_extensions()
                .check("vkEnumerateInstanceExtensionProperties")?;
            if available.iter().any(|ext| ext.name.as_bytes() == debug_utils.to_bytes()) {
                extensions.push(debug_utils.to_owned());
            }
        } else {
            display_error(
                "Validation layer VK_LAYER_KHRONOS_validation not present, validation is disabled.",
                "Warning",
            );
        }
    }

    let desc = InstanceDesc {
        application_name: c_name(&settings.application_name)?,
        application_version: settings.application_version,
        engine_name: c_name(&settings.engine_name)?,
        engine_version: settings.engine_version,
        api_version: vk::API_VERSION_1_0,
        extensions,
        layers,
    };

    api.create_instance(&desc).check("vkCreateInstance")
}

fn validation_layer_available<A: GraphicsApi>(api: &A) -> Result<bool> {
    let layers = api
        .instance_layers()
        .check("vkEnumerateInstanceLayerProperties")?;
    Ok(layers
        .iter()
        .any(|layer| layer.name.as_bytes() == VALIDATION_LAYER.to_bytes()))
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| RendererError::InvalidName(name.to_string()))
}
