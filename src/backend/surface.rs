// Surface - binds the window to the instance

use ash::{extensions::khr::Surface as SurfaceLoader, vk, Entry};

use super::error::{BootstrapError, BootstrapResult};
use crate::window::WindowSystem;

pub fn bind_surface<W: WindowSystem + ?Sized>(
    entry: &Entry,
    instance: &ash::Instance,
    window: &W,
) -> BootstrapResult<(SurfaceLoader, vk::SurfaceKHR)> {
    let surface = window
        .create_surface(entry, instance)
        .map_err(BootstrapError::SurfaceCreationFailed)?;
    let loader = SurfaceLoader::new(entry, instance);

    log::info!("Window surface created");
    Ok((loader, surface))
}
