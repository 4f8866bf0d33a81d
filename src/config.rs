// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Every section is optional. A missing file yields defaults; a file that
// cannot be read or parsed is reported and replaced by defaults.

use crate::backend::device::AcceleratorPreference;
use crate::backend::instance::InstanceSettings;
use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub application: ApplicationConfig,
    pub device: DeviceConfig,
    pub shaders: ShaderConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Inexor Vulkan Renderer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Identity reported to the driver at instance creation
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub application_name: String,
    /// `[major, minor, patch]`
    pub application_version: [u32; 3],
    pub engine_name: String,
    pub engine_version: [u32; 3],
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            application_name: "Inexor Vulkan Renderer".to_string(),
            application_version: [1, 0, 0],
            engine_name: "Inexor Engine".to_string(),
            engine_version: [1, 0, 0],
        }
    }
}

/// Accelerator selection and queue allocation
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub accelerator: AcceleratorPreference,
    pub queue_count: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            accelerator: AcceleratorPreference::First,
            queue_count: 1,
        }
    }
}

/// Compiled SPIR-V binaries loaded at startup
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub directory: PathBuf,
    pub files: Vec<String>,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("shaders"),
            files: vec![
                "vertex_shader.spv".to_string(),
                "fragment_shader.spv".to_string(),
            ],
        }
    }
}

impl ShaderConfig {
    /// Shader files in load order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|file| self.directory.join(file)).collect()
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    /// Capability dumps at info level instead of debug.
    pub print_capabilities: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            print_capabilities: true,
            log_level: "info".to_string(),
        }
    }
}

impl DebugConfig {
    /// Configured level, or info when the name is not a level.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.parsed_level().unwrap_or(log::LevelFilter::Info)
    }

    fn parsed_level(&self) -> Option<log::LevelFilter> {
        self.log_level.parse().ok()
    }
}

/// Configuration plus what happened while reading it.
///
/// Loading runs before the logger exists, so messages are held here and
/// written out by `emit` once logging is up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub messages: Vec<(log::Level, String)>,
}

impl LoadedConfig {
    pub fn emit(&self) {
        for (level, message) in &self.messages {
            log::log!(*level, "{}", message);
        }
    }

    #[cfg(test)]
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|(level, _)| *level <= log::Level::Warn)
            .map(|(_, message)| message.as_str())
    }
}

impl Config {
    /// Load config.toml from the working directory
    pub fn load() -> LoadedConfig {
        Self::load_or_default("config.toml")
    }

    /// Load configuration from file, falling back to defaults if it is
    /// missing, unreadable or malformed
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> LoadedConfig {
        let path = path.as_ref();
        let mut messages = Vec::new();

        let config = if !path.exists() {
            messages.push((
                log::Level::Info,
                format!("Config file not found at {:?}, using defaults", path),
            ));
            Config::default()
        } else {
            match Self::load_from_path(path) {
                Ok(config) => {
                    messages.push((
                        log::Level::Info,
                        format!("Loaded configuration from {:?}", path),
                    ));
                    config
                }
                Err(e) => {
                    messages.push((
                        log::Level::Warn,
                        format!("Failed to load {:?}: {:#}. Using defaults.", path, e),
                    ));
                    Config::default()
                }
            }
        };

        if config.debug.parsed_level().is_none() {
            messages.push((
                log::Level::Warn,
                format!(
                    "Unknown log level '{}', defaulting to info",
                    config.debug.log_level
                ),
            ));
        }
        messages.push((log::Level::Debug, format!("Config: {:?}", config)));

        LoadedConfig { config, messages }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn instance_settings(&self) -> InstanceSettings {
        let app = &self.application;
        InstanceSettings {
            application_name: app.application_name.clone(),
            application_version: pack_version(app.application_version),
            engine_name: app.engine_name.clone(),
            engine_version: pack_version(app.engine_version),
            enable_validation: self.debug.validation_layers,
        }
    }
}

fn pack_version([major, minor, patch]: [u32; 3]) -> u32 {
    vk::make_api_version(0, major, minor, patch)
}
