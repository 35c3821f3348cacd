// =============================================================================
// VULKAN BOOTSTRAP
// =============================================================================
//
// Brings up everything a frame needs before it can be drawn, then idles in
// the window loop until asked to close.
//
// PIPELINE:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Instance (+ debug messenger)                                   │
// │    └── Surface (bound to the window)                            │
// │          └── Physical device → queue families                   │
// │                └── Logical device (graphics + present queues)   │
// │                      └── Swapchain + image views                │
// └─────────────────────────────────────────────────────────────────┘
//
// Teardown runs the other way: views, swapchain, surface, device, instance.
//
// =============================================================================

mod backend;
mod config;
mod thread_pin;
mod window;

use anyhow::{Context, Result};
use backend::{BootstrapError, BootstrapParams, RenderContext};
use config::Config;
use thread_pin::ThreadPin;
use window::{WindowSystem, WinitWindowSystem};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging(&config);
    log::info!("Starting Vulkan bootstrap");
    log::info!("Present mode: {:?}", config.graphics.present_mode);

    if let Err(e) = run(&config) {
        log::error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(config.debug.log_level.as_str())).init();
}

fn run(config: &Config) -> Result<()> {
    // Window and driver calls stay on this thread for the whole run.
    let pin = ThreadPin::acquire()?;

    let params = BootstrapParams::from_config(config).context("Invalid configuration")?;
    let mut window =
        WinitWindowSystem::open(&config.window, &pin).context("Failed to open window")?;

    let context = RenderContext::bootstrap(&pin, &window, &params).map_err(|e| {
        let message = describe_failure(&e);
        anyhow::Error::new(e).context(message)
    })?;

    log::info!(
        "Ready: {} swapchain images at {}x{}, graphics queue family {}, present queue family {}",
        context.swapchain.image_count(),
        context.swapchain.config.extent.width,
        context.swapchain.config.extent.height,
        context.device.queue_families.graphics,
        context.device.queue_families.present
    );
    context.log_handles();

    while !window.should_close() {
        window.poll_events();
        window.present_frame();
    }

    // The surface has to go before the window it was created from.
    drop(context);
    drop(window);
    Ok(())
}

fn describe_failure(error: &BootstrapError) -> String {
    match error.status() {
        Some(status) => format!(
            "Vulkan bootstrap failed at the {} stage (VkResult {})",
            error.stage(),
            status.as_raw()
        ),
        None => format!("Vulkan bootstrap failed at the {} stage", error.stage()),
    }
}
