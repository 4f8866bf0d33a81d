// Backend module - Vulkan bootstrap components
//
// Every component talks to the driver through `api::GraphicsApi`, so the
// whole bootstrap runs against `vulkan::AshApi` in production and against
// recording doubles in tests.

pub mod api;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod shader;
pub mod swapchain;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod testing;
