// Shader module loading
//
// Vulkan consumes SPIR-V as 4-byte words. Blobs are validated here before
// anything reaches the backend: empty input is recoverable, a length that
// is not a multiple of 4 is rejected.

use super::device::LogicalDeviceContext;
use super::api::GraphicsApi;
use super::error::{RendererError, Result, VkResultExt};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// A shader module owned by one logical device.
#[derive(Debug)]
pub struct ShaderModule {
    pub handle: vk::ShaderModule,
    pub label: String,
}

impl ShaderModule {
    pub fn destroy<A: GraphicsApi>(self, api: &mut A, device: &LogicalDeviceContext) {
        api.destroy_shader_module(device.handle, self.handle);
        log::debug!("Destroyed shader module {}", self.label);
    }
}

/// Read a compiled shader binary and create a module from it.
pub fn load_from_file<A: GraphicsApi>(
    api: &mut A,
    device: &LogicalDeviceContext,
    path: &Path,
) -> Result<ShaderModule> {
    log::info!("Creating shader module from file: {}", path.display());

    let bytes = std::fs::read(path).map_err(|source| RendererError::ShaderIo {
        path: path.to_path_buf(),
        source,
    })?;

    create_from_bytes(api, device, &bytes, &path.display().to_string())
}

pub fn create_from_bytes<A: GraphicsApi>(
    api: &mut A,
    device: &LogicalDeviceContext,
    bytes: &[u8],
    label: &str,
) -> Result<ShaderModule> {
    if bytes.is_empty() {
        return Err(RendererError::EmptyShaderBinary(label.to_string()));
    }

    let misaligned = || RendererError::MisalignedShaderBinary {
        label: label.to_string(),
        len: bytes.len(),
    };
    if bytes.len() % 4 != 0 {
        return Err(misaligned());
    }

    // read_spv copies into properly aligned storage and checks the magic.
    let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| {
        RendererError::InvalidShaderBinary {
            label: label.to_string(),
            reason: e.to_string(),
        }
    })?;

    let handle = api
        .create_shader_module(device.handle, &code)
        .check("vkCreateShaderModule")?;

    Ok(ShaderModule {
        handle,
        label: label.to_string(),
    })
}
