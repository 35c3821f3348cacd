// Physical device selection
//
// Enumerates the GPUs the driver reports and picks one. The policy is kept in
// its own function so a scoring policy can replace it without touching the
// pipeline.

use ash::{prelude::VkResult, vk};
use std::ffi::CStr;

use super::error::{BootstrapError, BootstrapResult};

/// Pick the first candidate in driver order.
///
/// No scoring of discrete vs. integrated GPUs, memory or features.
pub fn select_first_suitable<T: Copy>(candidates: &[T]) -> Option<T> {
    candidates.first().copied()
}

/// Turn the raw enumeration result into a selection.
pub fn select_from_enumeration(
    enumerated: VkResult<Vec<vk::PhysicalDevice>>,
) -> BootstrapResult<vk::PhysicalDevice> {
    let devices = enumerated.map_err(BootstrapError::DeviceEnumerationFailed)?;
    log::info!("Found {} physical device(s)", devices.len());
    select_first_suitable(&devices).ok_or(BootstrapError::NoDeviceEnumerated)
}

pub fn pick_physical_device(instance: &ash::Instance) -> BootstrapResult<vk::PhysicalDevice> {
    let physical_device = select_from_enumeration(unsafe { instance.enumerate_physical_devices() })?;

    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    log::info!(
        "Selected GPU: {} ({:?})",
        unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
        properties.device_type
    );
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );

    Ok(physical_device)
}
