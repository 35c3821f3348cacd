// Bootstrap errors
//
// One variant per way the bootstrap pipeline can fail. Every stage returns
// these unchanged; nothing in the pipeline recovers locally.

use ash::vk;
use thiserror::Error;

pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Vulkan is not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Failed to create Vulkan instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("Failed to create window surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("Failed to enumerate physical devices: {0}")]
    DeviceEnumerationFailed(vk::Result),

    #[error("No Vulkan-capable GPU found")]
    NoDeviceEnumerated,

    #[error("No queue family supports graphics")]
    NoGraphicsQueue,

    #[error("No queue family can present to the surface")]
    NoPresentQueue,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("Failed to create swapchain: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("Failed to query swapchain images: {reason}")]
    SwapchainImageQueryFailed { reason: String },

    #[error("Failed to create view for swapchain image {index}: {result}")]
    ImageViewCreationFailed { index: usize, result: vk::Result },
}

impl BootstrapError {
    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform(_) | Self::InstanceCreationFailed(_) => "instance",
            Self::SurfaceCreationFailed(_) => "surface",
            Self::DeviceEnumerationFailed(_) | Self::NoDeviceEnumerated => "physical device",
            Self::NoGraphicsQueue | Self::NoPresentQueue => "queue families",
            Self::DeviceCreationFailed(_) => "logical device",
            Self::NoSurfaceFormat
            | Self::SwapchainCreationFailed(_)
            | Self::SwapchainImageQueryFailed { .. }
            | Self::ImageViewCreationFailed { .. } => "swapchain",
        }
    }

    /// Driver status code carried by the error, if any.
    pub fn status(&self) -> Option<vk::Result> {
        match self {
            Self::InstanceCreationFailed(r)
            | Self::SurfaceCreationFailed(r)
            | Self::DeviceEnumerationFailed(r)
            | Self::DeviceCreationFailed(r)
            | Self::SwapchainCreationFailed(r) => Some(*r),
            Self::ImageViewCreationFailed { result, .. } => Some(*result),
            _ => None,
        }
    }
}
