// Window system
//
// The bootstrap only needs what `WindowSystem` exposes. `WinitWindowSystem`
// provides it with a fixed-size winit window driven by polling.

use anyhow::{bail, Context, Result};
use ash::{prelude::VkResult, vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::WindowConfig;
use crate::thread_pin::ThreadPin;

/// How long one `poll_events` call may wait for events.
const POLL_TIMEOUT: Duration = Duration::from_millis(16);
/// Event loop iterations allowed before the window must exist.
const STARTUP_PUMPS: usize = 64;

/// What the bootstrap and the render loop need from the windowing layer.
pub trait WindowSystem {
    /// Whether the platform can present Vulkan surfaces at all.
    fn vulkan_supported(&self) -> bool;

    /// Instance extensions needed to create surfaces for this window.
    fn required_instance_extensions(&self) -> VkResult<Vec<CString>>;

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> VkResult<vk::SurfaceKHR>;

    fn should_close(&self) -> bool;

    fn poll_events(&mut self);

    fn present_frame(&self);
}

pub struct WinitWindowSystem {
    event_loop: EventLoop<()>,
    host: WindowHost,
}

#[derive(Default)]
struct WindowHost {
    attributes: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    close_requested: bool,
    create_error: Option<winit::error::OsError>,
}

impl WinitWindowSystem {
    /// Open a non-resizable window at exactly the configured size.
    pub fn open(config: &WindowConfig, _pin: &ThreadPin) -> Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let size = PhysicalSize::new(config.width, config.height);
        let attributes = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(size)
            .with_min_inner_size(size)
            .with_max_inner_size(size)
            .with_resizable(false);

        let mut system = Self {
            event_loop,
            host: WindowHost {
                attributes: Some(attributes),
                ..Default::default()
            },
        };

        for _ in 0..STARTUP_PUMPS {
            let status = system
                .event_loop
                .pump_app_events(Some(Duration::ZERO), &mut system.host);

            if let Some(e) = system.host.create_error.take() {
                return Err(e).context("Failed to create window");
            }
            if system.host.window.is_some() {
                log::info!("Window: {}x{} ({})", config.width, config.height, config.title);
                return Ok(system);
            }
            if let PumpStatus::Exit(code) = status {
                bail!("Event loop exited with code {} before the window was created", code);
            }
        }

        bail!("Window was not created after {} event loop iterations", STARTUP_PUMPS)
    }
}

impl WindowSystem for WinitWindowSystem {
    fn vulkan_supported(&self) -> bool {
        if let Err(e) = unsafe { Entry::load() } {
            log::error!("Vulkan loader not available: {}", e);
            return false;
        }
        match self.required_instance_extensions() {
            Ok(_) => true,
            Err(e) => {
                log::error!("Window system has no Vulkan surface support: {}", e);
                false
            }
        }
    }

    fn required_instance_extensions(&self) -> VkResult<Vec<CString>> {
        let window = self
            .host
            .window
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let names = ash_window::enumerate_required_extensions(window.raw_display_handle())?;
        Ok(names
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) }.to_owned())
            .collect())
    }

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance) -> VkResult<vk::SurfaceKHR> {
        let window = self
            .host
            .window
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
    }

    fn should_close(&self) -> bool {
        self.host.close_requested
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(POLL_TIMEOUT), &mut self.host)
        {
            log::info!("Event loop exited with code {}", code);
            self.host.close_requested = true;
        }
    }

    fn present_frame(&self) {
        if let Some(window) = &self.host.window {
            window.pre_present_notify();
        }
    }
}

impl ApplicationHandler for WindowHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                log::info!("ESC pressed, exiting...");
                self.close_requested = true;
            }
            _ => {}
        }
    }
}
