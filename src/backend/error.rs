// Error signal - classification of Vulkan result codes
//
// Every backend call passes its result through `classify` (via
// `VkResultExt::check`) right at the call site. Fatal errors unwind to
// the renderer lifecycle, recoverable ones are logged and worked around.

use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// How bad a failure is for the bootstrap sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged, execution continues in a degraded mode.
    Recoverable,
    /// The current initialization sequence must be aborted.
    Fatal,
}

/// Classified outcome of a single Vulkan result code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Recoverable(&'static str),
    Fatal(&'static str),
}

impl Outcome {
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Outcome::Success => None,
            Outcome::Recoverable(_) => Some(Severity::Recoverable),
            Outcome::Fatal(_) => Some(Severity::Fatal),
        }
    }
}

/// Classify a result code. Positive status codes are not errors in
/// Vulkan, so they never abort the bootstrap.
pub fn classify(result: vk::Result) -> Outcome {
    if result == vk::Result::SUCCESS {
        Outcome::Success
    } else if result.as_raw() > 0 {
        Outcome::Recoverable(describe(result))
    } else {
        Outcome::Fatal(describe(result))
    }
}

/// Human readable description of a result code.
pub fn describe(result: vk::Result) -> &'static str {
    match result {
        vk::Result::SUCCESS => "Command successfully completed.",
        vk::Result::NOT_READY => "A fence or query has not yet completed.",
        vk::Result::TIMEOUT => "A wait operation has not completed in the specified time.",
        vk::Result::EVENT_SET => "An event is signaled.",
        vk::Result::EVENT_RESET => "An event is unsignaled.",
        vk::Result::INCOMPLETE => "A return array was too small for the result.",
        vk::Result::SUBOPTIMAL_KHR => {
            "A swapchain no longer matches the surface properties exactly, but can still be used to present to the surface successfully."
        }
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => "A host memory allocation has failed.",
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => "A device memory allocation has failed.",
        vk::Result::ERROR_INITIALIZATION_FAILED => {
            "Initialization of an object could not be completed for implementation-specific reasons."
        }
        vk::Result::ERROR_DEVICE_LOST => {
            "The logical or physical device has been lost. See Lost Device."
        }
        vk::Result::ERROR_MEMORY_MAP_FAILED => "Mapping of a memory object has failed.",
        vk::Result::ERROR_LAYER_NOT_PRESENT => {
            "A requested layer is not present or could not be loaded."
        }
        vk::Result::ERROR_EXTENSION_NOT_PRESENT => "A requested extension is not supported.",
        vk::Result::ERROR_FEATURE_NOT_PRESENT => "A requested feature is not supported.",
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => {
            "The requested version of Vulkan is not supported by the driver or is otherwise incompatible for implementation-specific reasons."
        }
        vk::Result::ERROR_TOO_MANY_OBJECTS => {
            "Too many objects of the type have already been created."
        }
        vk::Result::ERROR_FORMAT_NOT_SUPPORTED => {
            "A requested format is not supported on this device."
        }
        vk::Result::ERROR_FRAGMENTED_POOL => {
            "A pool allocation has failed due to fragmentation of the pool's memory."
        }
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => "A pool memory allocation has failed.",
        vk::Result::ERROR_INVALID_EXTERNAL_HANDLE => {
            "An external handle is not a valid handle of the specified type."
        }
        vk::Result::ERROR_FRAGMENTATION => {
            "A descriptor pool creation has failed due to fragmentation."
        }
        vk::Result::ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS => {
            "A buffer creation or memory allocation failed because the requested address is not available."
        }
        vk::Result::ERROR_SURFACE_LOST_KHR => "A surface is no longer available.",
        vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR => {
            "The requested window is already in use by Vulkan or another API in a manner which prevents it from being used again."
        }
        vk::Result::ERROR_OUT_OF_DATE_KHR => {
            "A surface has changed in such a way that it is no longer compatible with the swapchain."
        }
        vk::Result::ERROR_INCOMPATIBLE_DISPLAY_KHR => {
            "The display used by a swapchain does not use the same presentable image layout, or is incompatible in a way that prevents sharing an image."
        }
        vk::Result::ERROR_VALIDATION_FAILED_EXT => "A validation layer found an error.",
        vk::Result::ERROR_INVALID_SHADER_NV => {
            "One or more shaders failed to compile or link."
        }
        vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT => {
            "An operation on a swapchain created with application controlled full-screen access failed as it did not have exclusive full-screen access."
        }
        _ => "Unknown Vulkan result code.",
    }
}

/// Present an error to the user.
///
/// There is no platform message box here; the message goes to the log
/// and to stderr so headless runs still see it.
pub fn display_error(message: &str, title: &str) {
    log::error!("{}: {}", title, message);
    eprintln!("[{}] {}", title, message);
}

/// Errors produced while bootstrapping the renderer.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("{operation} failed: {description} ({code:?})")]
    Vulkan {
        operation: &'static str,
        code: vk::Result,
        description: &'static str,
    },

    #[error("failed to load the Vulkan library: {0}")]
    Loading(String),

    #[error("window error: {0}")]
    Window(String),

    #[error("name {0:?} contains an interior NUL byte")]
    InvalidName(String),

    #[error("no Vulkan-capable accelerator found")]
    NoAccelerator,

    #[error("selection policy picked no usable accelerator out of {0}")]
    NoSuitableAccelerator(usize),

    #[error("queue family {0} does not exist on the selected accelerator")]
    MissingQueueFamily(u32),

    #[error("requested {requested} queues from queue family {family}, which reports a capacity of {available}")]
    QueueCountUnsupported {
        family: u32,
        requested: u32,
        available: u32,
    },

    #[error("required device extension {0} is not supported by the selected accelerator")]
    ExtensionNotSupported(String),

    #[error("the selected accelerator cannot present to the window surface")]
    PresentationUnsupported,

    #[error("swapchain requests {requested} images but the surface supports {min}..={max} (0 = unbounded)")]
    ImageCountOutOfRange { requested: u32, min: u32, max: u32 },

    #[error("failed to read shader binary {path:?}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("empty shader binary: {0}")]
    EmptyShaderBinary(String),

    #[error("shader binary {label} is {len} bytes, which is not a multiple of 4")]
    MisalignedShaderBinary { label: String, len: usize },

    #[error("shader binary {label} is not valid SPIR-V: {reason}")]
    InvalidShaderBinary { label: String, reason: String },

    #[error("lifecycle violation: {0}")]
    Lifecycle(&'static str),
}

impl RendererError {
    pub fn vulkan(operation: &'static str, code: vk::Result) -> Self {
        RendererError::Vulkan {
            operation,
            code,
            description: describe(code),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            RendererError::Vulkan { code, .. } => {
                classify(*code).severity().unwrap_or(Severity::Recoverable)
            }
            RendererError::ShaderIo { .. } | RendererError::EmptyShaderBinary(_) => {
                Severity::Recoverable
            }
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

pub type Result<T> = std::result::Result<T, RendererError>;

/// Route a backend result through the classifier.
pub trait VkResultExt<T> {
    fn check(self, operation: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn check(self, operation: &'static str) -> Result<T> {
        self.map_err(|code| {
            let error = RendererError::vulkan(operation, code);
            match classify(code) {
                Outcome::Recoverable(_) => log::warn!("{}", error),
                _ => log::error!("{}", error),
            }
            error
        })
    }
}
