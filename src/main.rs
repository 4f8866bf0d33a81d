// =============================================================================
// INEXOR VULKAN BOOTSTRAP
// =============================================================================
//
// Brings a Vulkan context up to the point where rendering could start:
//
//   Window (winit)
//     └── Instance (+ validation when available)
//           ├── Surface
//           └── Logical device (queues from family 0)
//                 ├── Swapchain + one image view per image
//                 └── Shader modules
//
// Then polls window events until close and tears everything down in
// reverse. A failed bootstrap exits with a non-zero status.
//
// =============================================================================

mod backend;
mod config;
mod renderer;
mod window;

use anyhow::{Context, Result};
use backend::error::display_error;
use backend::vulkan::AshApi;
use config::Config;
use renderer::Renderer;
use window::WinitWindowing;

fn main() -> Result<()> {
    let loaded = Config::load();

    init_logging(&loaded.config);
    loaded.emit();

    let config = loaded.config;
    log::info!("Starting {}", config.application.application_name);
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );

    let windowing = WinitWindowing::new().context("Failed to create the event loop")?;
    let api = AshApi::load().context("Failed to load Vulkan")?;

    let mut renderer = Renderer::new(config, api, windowing);

    if let Err(failure) = renderer.bootstrap() {
        display_error(&failure.to_string(), "Bootstrap failed");
        drop(renderer);
        std::process::exit(1);
    }

    renderer.run().context("Renderer main loop failed")?;
    log::info!("Shutdown complete ({:?})", renderer.state());
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    let mut builder = Builder::new();
    builder.filter_level(config.debug.level_filter());
    builder.parse_env(Env::default());
    builder.init();
}
