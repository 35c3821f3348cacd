// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{ensure, Context, Result};
use ash::vk;
use serde::Deserialize;
use std::ffi::CString;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Bootstrap".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// How presented images are paced.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresentModePreference {
    /// Vsync-locked, never tears, always available.
    #[default]
    Fifo,
    /// Lower latency at the cost of an extra image; falls back to FIFO.
    Mailbox,
}

impl PresentModePreference {
    pub fn as_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: PresentModePreference,
    /// Extra device extensions; VK_KHR_swapchain is always added.
    pub device_extensions: Vec<String>,
    pub api_version: String,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: PresentModePreference::Fifo,
            device_extensions: Vec::new(),
            api_version: "1.1".to_string(),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: cfg!(debug_assertions),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.window.width > 0 && self.window.height > 0,
            "window size must be positive, got {}x{}",
            self.window.width,
            self.window.height
        );
        self.api_version()?;
        self.device_extensions()?;
        Ok(())
    }

    /// Requested Vulkan API version as a packed version number
    pub fn api_version(&self) -> Result<u32> {
        match self.graphics.api_version.trim() {
            "1.0" => Ok(vk::API_VERSION_1_0),
            "1.1" => Ok(vk::API_VERSION_1_1),
            "1.2" => Ok(vk::API_VERSION_1_2),
            "1.3" => Ok(vk::API_VERSION_1_3),
            other => anyhow::bail!("Unsupported Vulkan API version '{}'", other),
        }
    }

    /// Configured device extension names as C strings
    pub fn device_extensions(&self) -> Result<Vec<CString>> {
        self.graphics
            .device_extensions
            .iter()
            .map(|name| {
                CString::new(name.as_str())
                    .with_context(|| format!("Invalid device extension name: {:?}", name))
            })
            .collect()
    }

    pub fn present_mode(&self) -> PresentModePreference {
        self.graphics.present_mode
    }

    /// Fallback swapchain size when the surface leaves it to the application
    pub fn requested_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.window.width,
            height: self.window.height,
        }
    }
}
