// Backend module - Vulkan bootstrap pipeline
//
// instance -> surface -> physical device -> queue families -> logical device
// -> swapchain. Each stage registers its release with the teardown sequencer
// the moment its resource exists, so a failure anywhere unwinds exactly what
// was built.

pub mod device;
pub mod error;
pub mod instance;
pub mod physical;
pub mod queue_family;
pub mod surface;
pub mod swapchain;
pub mod teardown;

pub use device::LogicalDevice;
pub use error::{BootstrapError, BootstrapResult};
pub use swapchain::Swapchain;
pub use teardown::TeardownSequencer;

use anyhow::Result;
use ash::vk;
use std::ffi::CString;

use crate::config::{Config, PresentModePreference};
use crate::thread_pin::ThreadPin;
use crate::window::WindowSystem;
use instance::InstanceDesc;
use swapchain::SurfaceTarget;
use teardown::Stage;

/// Inputs to the bootstrap, resolved from configuration.
#[derive(Debug, Clone)]
pub struct BootstrapParams {
    pub app_name: String,
    pub api_version: u32,
    pub device_extensions: Vec<CString>,
    pub requested_extent: vk::Extent2D,
    pub present_mode: PresentModePreference,
    pub enable_validation: bool,
}

impl BootstrapParams {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            app_name: config.window.title.clone(),
            api_version: config.api_version()?,
            device_extensions: config.device_extensions()?,
            requested_extent: config.requested_extent(),
            present_mode: config.present_mode(),
            enable_validation: config.debug.validation_layers,
        })
    }
}

/// Everything the bootstrap produced. Dropping it tears the context down.
pub struct RenderContext {
    pub instance: ash::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub device: LogicalDevice,
    pub swapchain: Swapchain,
    teardown: TeardownSequencer,
}

impl RenderContext {
    pub fn bootstrap<W: WindowSystem + ?Sized>(
        _pin: &ThreadPin,
        window: &W,
        params: &BootstrapParams,
    ) -> BootstrapResult<Self> {
        log::info!("Initializing Vulkan...");

        if !window.vulkan_supported() {
            return Err(BootstrapError::UnsupportedPlatform(
                "window system reports no Vulkan support".to_string(),
            ));
        }

        let entry = instance::load_entry()?;
        let mut teardown = TeardownSequencer::new();

        let required_extensions = window.required_instance_extensions().map_err(|e| {
            BootstrapError::UnsupportedPlatform(format!("no surface extensions available: {e}"))
        })?;

        let enable_validation = params.enable_validation && {
            let available = instance::validation_layer_available(&entry);
            if !available {
                log::warn!("Validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }
            available
        };

        // STEP 1: Instance
        let instance = instance::create_instance(
            &entry,
            &InstanceDesc {
                app_name: &params.app_name,
                api_version: params.api_version,
                required_extensions: &required_extensions,
                enable_validation,
            },
        )?;
        {
            let instance = instance.clone();
            // The loader library has to stay mapped until the instance is gone.
            let entry = entry.clone();
            teardown.register(Stage::Instance, move || {
                unsafe { instance.destroy_instance(None) };
                drop(entry);
                Ok(())
            });
        }

        if enable_validation {
            let (debug_utils, messenger) = instance::create_debug_messenger(&entry, &instance)?;
            teardown.register(Stage::DebugMessenger, move || {
                unsafe { debug_utils.destroy_debug_utils_messenger(messenger, None) };
                Ok(())
            });
        }

        // STEP 2: Surface
        let (surface_loader, surface) = surface::bind_surface(&entry, &instance, window)?;
        {
            let loader = surface_loader.clone();
            teardown.register(Stage::Surface, move || {
                unsafe { loader.destroy_surface(surface, None) };
                Ok(())
            });
        }

        // STEP 3: Physical device
        let physical_device = physical::pick_physical_device(&instance)?;

        // STEP 4: Queue families
        let queue_families = queue_family::resolve_for_surface(
            &instance,
            &surface_loader,
            physical_device,
            surface,
        )?;

        // STEP 5: Logical device
        let device = LogicalDevice::new(
            &instance,
            physical_device,
            queue_families,
            &params.device_extensions,
        )?;
        {
            let device = device.device.clone();
            teardown.register(Stage::LogicalDevice, move || {
                unsafe { device.destroy_device(None) };
                Ok(())
            });
        }

        // STEP 6: Swapchain + image views
        let swapchain = Swapchain::new(
            &instance,
            &device,
            &SurfaceTarget {
                loader: &surface_loader,
                surface,
                physical_device,
            },
            params.requested_extent,
            params.present_mode,
            &mut teardown,
        )?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            instance,
            surface,
            physical_device,
            device,
            swapchain,
            teardown,
        })
    }

    /// Raw handles of everything the bootstrap created, for debugging.
    pub fn log_handles(&self) {
        log::debug!(
            "Instance {:?}, surface {:?}, physical device {:?}",
            self.instance.handle(),
            self.surface,
            self.physical_device
        );
        log::debug!(
            "Queues: graphics {:?}, present {:?}",
            self.device.graphics_queue,
            self.device.present_queue
        );
        log::debug!(
            "Swapchain {:?} with views {:?}",
            self.swapchain.swapchain,
            self.swapchain.image_views
        );
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device did not go idle before teardown: {:#}", e);
        }
        self.teardown.run();

        log::info!("Cleanup complete");
    }
}
