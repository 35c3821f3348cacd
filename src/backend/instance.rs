// Vulkan instance - loader, instance and optional validation messenger
//
// Responsibilities:
// - Load the Vulkan library
// - Instance creation with the window system's required extensions
// - Validation layers + debug messenger when enabled

use ash::{extensions::ext::DebugUtils, vk, Entry};
use std::ffi::{c_char, CStr, CString};

use super::error::{BootstrapError, BootstrapResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// What the instance is created with.
#[derive(Debug, Clone)]
pub struct InstanceDesc<'a> {
    pub app_name: &'a str,
    pub api_version: u32,
    /// Extensions the window system needs to create surfaces.
    pub required_extensions: &'a [CString],
    pub enable_validation: bool,
}

/// Load the Vulkan loader library.
pub fn load_entry() -> BootstrapResult<Entry> {
    let entry = unsafe { Entry::load() };
    entry.map_err(|e| {
        BootstrapError::UnsupportedPlatform(format!("failed to load the Vulkan library: {e}"))
    })
}

/// Whether the Khronos validation layer is installed.
pub fn validation_layer_available(entry: &Entry) -> bool {
    match entry.enumerate_instance_layer_properties() {
        Ok(layers) => has_layer(&layers, VALIDATION_LAYER),
        Err(e) => {
            log::warn!("Failed to enumerate instance layers: {}", e);
            false
        }
    }
}

fn has_layer(layers: &[vk::LayerProperties], wanted: &CStr) -> bool {
    layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == wanted
    })
}

/// Instance extensions to enable: the window system's list plus whatever
/// validation and the platform need, without duplicates.
pub fn instance_extension_names(required: &[CString], enable_validation: bool) -> Vec<CString> {
    let mut names: Vec<CString> = Vec::with_capacity(required.len() + 3);
    let mut push = |name: &CStr| {
        if !names.iter().any(|n| n.as_c_str() == name) {
            names.push(name.to_owned());
        }
    };

    for name in required {
        push(name.as_c_str());
    }

    if enable_validation {
        push(DebugUtils::name());
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        push(vk::KhrPortabilityEnumerationFn::name());
        push(vk::KhrGetPhysicalDeviceProperties2Fn::name());
    }

    names
}

pub fn create_instance(entry: &Entry, desc: &InstanceDesc<'_>) -> BootstrapResult<ash::Instance> {
    log::info!("Creating Vulkan instance: {}", desc.app_name);

    let app_name = CString::new(desc.app_name)
        .map_err(|_| BootstrapError::InstanceCreationFailed(vk::Result::ERROR_INITIALIZATION_FAILED))?;
    let engine_name = c"No Engine";

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(desc.api_version);

    let extensions = instance_extension_names(desc.required_extensions, desc.enable_validation);
    for name in &extensions {
        log::debug!("Instance extension: {}", name.to_string_lossy());
    }
    let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|n| n.as_ptr()).collect();

    let layer_names = if desc.enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    let flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    let flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_names)
        .flags(flags);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(BootstrapError::InstanceCreationFailed)?;

    log::info!(
        "Vulkan instance created (API {}.{})",
        vk::api_version_major(desc.api_version),
        vk::api_version_minor(desc.api_version)
    );
    Ok(instance)
}

pub fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> BootstrapResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
        .map_err(BootstrapError::InstanceCreationFailed)?;

    Ok((debug_utils, messenger))
}

// Routes validation output into the log facade
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
