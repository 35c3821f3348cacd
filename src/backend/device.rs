// Logical device - queue creation and retrieval
//
// One queue create info per distinct family index, priority 1.0.
// The swapchain extension is always requested explicitly.

use ash::{extensions::khr::Swapchain as SwapchainLoader, vk};
use std::ffi::{c_char, CStr, CString};

use super::error::{BootstrapError, BootstrapResult};
use super::queue_family::ResolvedQueueFamilies;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Logical device plus the queues retrieved from it.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub queue_families: ResolvedQueueFamilies,
}

impl LogicalDevice {
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: ResolvedQueueFamilies,
        requested_extensions: &[CString],
    ) -> BootstrapResult<Self> {
        let queue_create_infos = queue_create_infos(&queue_families);

        let extensions = device_extension_names(requested_extensions);
        for name in &extensions {
            log::debug!("Device extension: {}", name.to_string_lossy());
        }
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|n| n.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(BootstrapError::DeviceCreationFailed)?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        log::info!(
            "Logical device created with {} queue family(ies)",
            queue_create_infos.len()
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            queue_families,
        })
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> anyhow::Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

/// One create info per distinct family, each asking for a single queue.
pub fn queue_create_infos(families: &ResolvedQueueFamilies) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .unique()
        .into_iter()
        .map(|index| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(index)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

/// Configured device extensions with `VK_KHR_swapchain` (and the portability
/// subset on Apple platforms) guaranteed present, without duplicates.
pub fn device_extension_names(requested: &[CString]) -> Vec<CString> {
    let mut names: Vec<CString> = Vec::with_capacity(requested.len() + 2);
    let mut push = |name: &CStr| {
        if !names.iter().any(|n| n.as_c_str() == name) {
            names.push(name.to_owned());
        }
    };

    push(SwapchainLoader::name());

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    push(vk::KhrPortabilitySubsetFn::name());

    for name in requested {
        push(name.as_c_str());
    }

    names
}
