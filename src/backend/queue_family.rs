// Queue family resolution
//
// Finds the lowest queue family index that supports graphics and, separately,
// the lowest one that can present to the surface. The two may coincide.

use ash::{prelude::VkResult, vk};

use super::error::{BootstrapError, BootstrapResult};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices, once resolution succeeded.
    pub fn resolved(&self) -> BootstrapResult<ResolvedQueueFamilies> {
        Ok(ResolvedQueueFamilies {
            graphics: self.graphics.ok_or(BootstrapError::NoGraphicsQueue)?,
            present: self.present.ok_or(BootstrapError::NoPresentQueue)?,
        })
    }
}

/// Queue family indices with both roles known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedQueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl ResolvedQueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Scan `families` from index 0, recording the first graphics family and the
/// first family for which `supports_present` answers true. Stops as soon as
/// both are known.
pub fn resolve<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> BootstrapResult<ResolvedQueueFamilies>
where
    F: FnMut(u32) -> VkResult<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() {
            match supports_present(index) {
                Ok(true) => indices.present = Some(index),
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Surface support query failed for queue family {}: {}", index, e);
                }
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    indices.resolved()
}

/// Resolve queue families for `physical_device` against `surface`.
pub fn resolve_for_surface(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> BootstrapResult<ResolvedQueueFamilies> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    log::debug!("Physical device exposes {} queue families", families.len());

    let resolved = resolve(&families, |index| unsafe {
        surface_loader.get_physical_device_surface_support(physical_device, index, surface)
    })?;

    log::info!(
        "Queue families: graphics={}, present={}",
        resolved.graphics,
        resolved.present
    );
    Ok(resolved)
}
