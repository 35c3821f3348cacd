// Swapchain - Window presentation
//
// Negotiates the surface's capabilities into a `SwapchainConfig`, creates the
// swapchain and one view per image. The negotiation steps are plain functions
// over the queried capabilities, and the driver calls sit behind
// `SwapchainDriver`, so both can be checked without a GPU.

use ash::{extensions::khr::Surface as SurfaceLoader, extensions::khr::Swapchain as SwapchainLoader};
use ash::{prelude::VkResult, vk};

use super::error::{BootstrapError, BootstrapResult};
use super::physical::select_first_suitable;
use super::queue_family::ResolvedQueueFamilies;
use super::teardown::{Stage, TeardownSequencer};
use super::LogicalDevice;
use crate::config::PresentModePreference;

/// `currentExtent.width` value meaning "the application picks the size".
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Composite alpha modes in order of preference.
const COMPOSITE_ALPHA_PREFERENCE: [vk::CompositeAlphaFlagsKHR; 4] = [
    vk::CompositeAlphaFlagsKHR::OPAQUE,
    vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::INHERIT,
];

/// Everything negotiated with the surface before the swapchain is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub image_format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub sharing_mode: vk::SharingMode,
    /// Empty for exclusive sharing.
    pub queue_family_indices: Vec<u32>,
}

impl SwapchainConfig {
    pub fn negotiate(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        formats: &[vk::SurfaceFormatKHR],
        present_modes: &[vk::PresentModeKHR],
        queue_families: &ResolvedQueueFamilies,
        requested: vk::Extent2D,
        preference: PresentModePreference,
    ) -> BootstrapResult<Self> {
        let surface_format = choose_surface_format(formats)?;
        let (sharing_mode, queue_family_indices) = choose_sharing(queue_families);

        Ok(Self {
            image_format: surface_format.format,
            color_space: surface_format.color_space,
            extent: choose_extent(capabilities, requested),
            image_count: choose_image_count(capabilities),
            pre_transform: choose_pre_transform(capabilities),
            composite_alpha: choose_composite_alpha(capabilities.supported_composite_alpha),
            present_mode: choose_present_mode(preference, present_modes),
            sharing_mode,
            queue_family_indices,
        })
    }
}

/// First reported pair wins.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> BootstrapResult<vk::SurfaceFormatKHR> {
    select_first_suitable(formats).ok_or(BootstrapError::NoSurfaceFormat)
}

/// One more than the minimum, clamped to the maximum when there is one.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width == UNDEFINED_EXTENT {
        requested
    } else {
        capabilities.current_extent
    }
}

pub fn choose_pre_transform(
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    COMPOSITE_ALPHA_PREFERENCE
        .iter()
        .copied()
        .find(|&mode| supported.contains(mode))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Mailbox only when asked for and offered; FIFO is always available.
pub fn choose_present_mode(
    preference: PresentModePreference,
    supported: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    let wanted = preference.as_vk();
    if supported.contains(&wanted) {
        wanted
    } else {
        if wanted != vk::PresentModeKHR::FIFO {
            log::warn!("Present mode {:?} not supported, using FIFO", wanted);
        }
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_sharing(families: &ResolvedQueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.present],
        )
    }
}

/// Check the result of the swapchain image query. The driver has to report
/// exactly the number of images that was requested.
pub fn checked_images(
    requested: u32,
    queried: VkResult<Vec<vk::Image>>,
) -> BootstrapResult<Vec<vk::Image>> {
    let images = queried.map_err(|e| BootstrapError::SwapchainImageQueryFailed {
        reason: e.to_string(),
    })?;
    if images.len() as u32 != requested {
        return Err(BootstrapError::SwapchainImageQueryFailed {
            reason: format!(
                "driver returned {} images, {} requested",
                images.len(),
                requested
            ),
        });
    }
    Ok(images)
}

pub fn image_view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::R,
            g: vk::ComponentSwizzle::G,
            b: vk::ComponentSwizzle::B,
            a: vk::ComponentSwizzle::A,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}

/// One view per image, index-aligned. On the first failure the views made so
/// far are destroyed and the whole stage fails.
pub fn create_image_views<C, D>(
    images: &[vk::Image],
    format: vk::Format,
    mut create: C,
    mut destroy: D,
) -> BootstrapResult<Vec<vk::ImageView>>
where
    C: FnMut(&vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>,
    D: FnMut(vk::ImageView),
{
    let mut views = Vec::with_capacity(images.len());

    for (index, &image) in images.iter().enumerate() {
        match create(&image_view_create_info(image, format)) {
            Ok(view) => views.push(view),
            Err(result) => {
                for view in views.into_iter().rev() {
                    destroy(view);
                }
                return Err(BootstrapError::ImageViewCreationFailed { index, result });
            }
        }
    }

    Ok(views)
}

/// Driver calls behind swapchain creation. Cloned into the teardown closures,
/// so implementations hold their own loader handles.
pub trait SwapchainDriver: Clone + 'static {
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;

    /// Count query, sizing and fill in one call.
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
}

#[derive(Clone)]
pub struct AshSwapchainDriver {
    loader: SwapchainLoader,
    device: ash::Device,
}

impl AshSwapchainDriver {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> Self {
        Self {
            loader: SwapchainLoader::new(instance, device),
            device: device.clone(),
        }
    }
}

impl SwapchainDriver for AshSwapchainDriver {
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.loader.create_swapchain(info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.loader.get_swapchain_images(swapchain) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.loader.destroy_swapchain(swapchain, None) };
    }
}

/// Handles produced by `build_chain`.
#[derive(Debug)]
pub struct SwapchainChain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

/// Create the swapchain, fetch its images and make one view per image.
///
/// The swapchain is registered with `teardown` only once it exists, and the
/// views only once every one of them was created.
pub fn build_chain<D: SwapchainDriver>(
    driver: &D,
    surface: vk::SurfaceKHR,
    config: &SwapchainConfig,
    teardown: &mut TeardownSequencer,
) -> BootstrapResult<SwapchainChain> {
    let create_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(config.image_count)
        .image_format(config.image_format)
        .image_color_space(config.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(config.sharing_mode)
        .queue_family_indices(&config.queue_family_indices)
        .pre_transform(config.pre_transform)
        .composite_alpha(config.composite_alpha)
        .present_mode(config.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    let swapchain = driver
        .create_swapchain(&create_info)
        .map_err(BootstrapError::SwapchainCreationFailed)?;
    {
        let driver = driver.clone();
        teardown.register(Stage::Swapchain, move || {
            driver.destroy_swapchain(swapchain);
            Ok(())
        });
    }

    let images = checked_images(config.image_count, driver.swapchain_images(swapchain))?;
    log::info!("Created swapchain with {} images", images.len());

    let image_views = create_image_views(
        &images,
        config.image_format,
        |info| driver.create_image_view(info),
        |view| driver.destroy_image_view(view),
    )?;
    {
        let driver = driver.clone();
        let views = image_views.clone();
        teardown.register(Stage::ImageViews, move || {
            for view in views {
                driver.destroy_image_view(view);
            }
            Ok(())
        });
    }

    Ok(SwapchainChain {
        swapchain,
        images,
        image_views,
    })
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub config: SwapchainConfig,
}

/// Surface-side inputs to the swapchain.
pub struct SurfaceTarget<'a> {
    pub loader: &'a SurfaceLoader,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
}

impl Swapchain {
    /// Negotiate with the surface, then create the swapchain and its views.
    pub fn new(
        instance: &ash::Instance,
        device: &LogicalDevice,
        target: &SurfaceTarget<'_>,
        requested: vk::Extent2D,
        preference: PresentModePreference,
        teardown: &mut TeardownSequencer,
    ) -> BootstrapResult<Self> {
        let SurfaceTarget {
            loader,
            surface,
            physical_device,
        } = *target;

        let capabilities = unsafe {
            loader.get_physical_device_surface_capabilities(physical_device, surface)
        }
        .map_err(BootstrapError::SwapchainCreationFailed)?;

        let formats = unsafe { loader.get_physical_device_surface_formats(physical_device, surface) }
            .map_err(BootstrapError::SwapchainCreationFailed)?;

        let present_modes =
            match unsafe { loader.get_physical_device_surface_present_modes(physical_device, surface) } {
                Ok(modes) => modes,
                Err(e) => {
                    log::warn!("Failed to query present modes ({}), assuming FIFO only", e);
                    vec![vk::PresentModeKHR::FIFO]
                }
            };

        let config = SwapchainConfig::negotiate(
            &capabilities,
            &formats,
            &present_modes,
            &device.queue_families,
            requested,
            preference,
        )?;

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}/{:?}, {:?}",
            config.extent.width,
            config.extent.height,
            config.image_count,
            config.image_format,
            config.color_space,
            config.present_mode
        );
        log::debug!(
            "Swapchain transform {:?}, composite alpha {:?}, sharing {:?} {:?}",
            config.pre_transform,
            config.composite_alpha,
            config.sharing_mode,
            config.queue_family_indices
        );

        let driver = AshSwapchainDriver::new(instance, &device.device);
        let chain = build_chain(&driver, surface, &config, teardown)?;

        Ok(Self {
            swapchain: chain.swapchain,
            images: chain.images,
            image_views: chain.image_views,
            config,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                | vk::SurfaceTransformFlagsKHR::ROTATE_90,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn shared_families() -> ResolvedQueueFamilies {
        ResolvedQueueFamilies {
            graphics: 0,
            present: 0,
        }
    }

    #[test]
    fn image_count_adds_one_and_clamps() {
        assert_eq!(choose_image_count(&capabilities(2, 4)), 3);
        assert_eq!(choose_image_count(&capabilities(4, 4)), 4);
        assert_eq!(choose_image_count(&capabilities(3, 0)), 4);
    }

    #[test]
    fn undefined_extent_uses_requested_size() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = extent(UNDEFINED_EXTENT, UNDEFINED_EXTENT);
        assert_eq!(choose_extent(&caps, extent(800, 600)), extent(800, 600));
    }

    #[test]
    fn defined_extent_is_used_verbatim() {
        let caps = capabilities(2, 3);
        assert_eq!(choose_extent(&caps, extent(800, 600)), extent(1024, 768));
    }

    #[test]
    fn identity_transform_is_preferred() {
        let caps = capabilities(2, 3);
        assert_eq!(
            choose_pre_transform(&caps),
            vk::SurfaceTransformFlagsKHR::IDENTITY
        );

        let mut caps = capabilities(2, 3);
        caps.supported_transforms = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(
            choose_pre_transform(&caps),
            vk::SurfaceTransformFlagsKHR::ROTATE_90
        );
    }

    #[test]
    fn composite_alpha_follows_preference_order() {
        assert_eq!(
            choose_composite_alpha(
                vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
            ),
            vk::CompositeAlphaFlagsKHR::OPAQUE
        );
        assert_eq!(
            choose_composite_alpha(
                vk::CompositeAlphaFlagsKHR::INHERIT | vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED
            ),
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED
        );
        assert_eq!(
            choose_composite_alpha(vk::CompositeAlphaFlagsKHR::INHERIT),
            vk::CompositeAlphaFlagsKHR::INHERIT
        );
    }

    #[test]
    fn first_surface_format_is_picked() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
        assert_eq!(
            choose_surface_format(&[]).unwrap_err(),
            BootstrapError::NoSurfaceFormat
        );
    }

    #[test]
    fn mailbox_falls_back_to_fifo() {
        let only_fifo = [vk::PresentModeKHR::FIFO];
        let both = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(PresentModePreference::Mailbox, &only_fifo),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(PresentModePreference::Mailbox, &both),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(PresentModePreference::Fifo, &both),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn sharing_mode_depends_on_queue_families() {
        let (mode, indices) = choose_sharing(&shared_families());
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());

        let (mode, indices) = choose_sharing(&ResolvedQueueFamilies {
            graphics: 2,
            present: 0,
        });
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn negotiate_combines_every_choice() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let config = SwapchainConfig::negotiate(
            &capabilities(2, 4),
            &formats,
            &[vk::PresentModeKHR::FIFO],
            &shared_families(),
            extent(800, 600),
            PresentModePreference::Fifo,
        )
        .unwrap();

        assert_eq!(
            config,
            SwapchainConfig {
                image_format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                extent: extent(1024, 768),
                image_count: 3,
                pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                present_mode: vk::PresentModeKHR::FIFO,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                queue_family_indices: Vec::new(),
            }
        );
    }

    #[test]
    fn negotiate_fails_without_formats() {
        let err = SwapchainConfig::negotiate(
            &capabilities(2, 4),
            &[],
            &[vk::PresentModeKHR::FIFO],
            &shared_families(),
            extent(800, 600),
            PresentModePreference::Fifo,
        )
        .unwrap_err();
        assert_eq!(err, BootstrapError::NoSurfaceFormat);
    }

    #[test]
    fn image_count_must_match_request() {
        let images: Vec<vk::Image> = (1..=3).map(vk::Image::from_raw).collect();
        assert_eq!(checked_images(3, Ok(images.clone())).unwrap(), images);
        assert!(matches!(
            checked_images(4, Ok(images.clone())),
            Err(BootstrapError::SwapchainImageQueryFailed { .. })
        ));
        // More images than asked for is rejected too, never truncated.
        assert!(matches!(
            checked_images(2, Ok(images)),
            Err(BootstrapError::SwapchainImageQueryFailed { .. })
        ));
    }

    #[test]
    fn image_query_error_is_reported() {
        let err = checked_images(3, Err(vk::Result::ERROR_DEVICE_LOST)).unwrap_err();
        assert_eq!(
            err,
            BootstrapError::SwapchainImageQueryFailed {
                reason: vk::Result::ERROR_DEVICE_LOST.to_string()
            }
        );
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Released {
        View(u64),
        Swapchain(u64),
    }

    /// In-memory driver. Views get the image handle plus 100.
    #[derive(Clone)]
    struct FakeDriver {
        create_result: vk::Result,
        images: VkResult<Vec<vk::Image>>,
        failing_view_image: Option<u64>,
        released: Rc<RefCell<Vec<Released>>>,
    }

    impl FakeDriver {
        fn with_images(count: u64) -> Self {
            Self {
                create_result: vk::Result::SUCCESS,
                images: Ok((1..=count).map(vk::Image::from_raw).collect()),
                failing_view_image: None,
                released: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn released(&self) -> Vec<Released> {
            self.released.borrow().clone()
        }
    }

    impl SwapchainDriver for FakeDriver {
        fn create_swapchain(
            &self,
            info: &vk::SwapchainCreateInfoKHR,
        ) -> VkResult<vk::SwapchainKHR> {
            assert_eq!(info.image_array_layers, 1);
            assert_eq!(info.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
            assert_eq!(info.clipped, vk::TRUE);
            assert_eq!(info.old_swapchain, vk::SwapchainKHR::null());
            self.create_result.result_with_success(vk::SwapchainKHR::from_raw(42))
        }

        fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
            self.images.clone()
        }

        fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
            if self.failing_view_image == Some(info.image.as_raw()) {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            Ok(vk::ImageView::from_raw(info.image.as_raw() + 100))
        }

        fn destroy_image_view(&self, view: vk::ImageView) {
            self.released
                .borrow_mut()
                .push(Released::View(view.as_raw()));
        }

        fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
            self.released
                .borrow_mut()
                .push(Released::Swapchain(swapchain.as_raw()));
        }
    }

    fn chain_config(image_count: u32) -> SwapchainConfig {
        SwapchainConfig {
            image_format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            extent: extent(800, 600),
            image_count,
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: vk::PresentModeKHR::FIFO,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
        }
    }

    #[test]
    fn complete_chain_registers_both_stages() {
        let driver = FakeDriver::with_images(3);
        let mut teardown = TeardownSequencer::new();
        let chain =
            build_chain(&driver, vk::SurfaceKHR::null(), &chain_config(3), &mut teardown).unwrap();

        assert_eq!(chain.images.len(), 3);
        assert_eq!(chain.image_views.len(), 3);
        assert!(teardown.is_registered(Stage::Swapchain));
        assert!(teardown.is_registered(Stage::ImageViews));
        assert!(driver.released().is_empty());

        teardown.run();
        assert_eq!(
            driver.released(),
            vec![
                Released::View(101),
                Released::View(102),
                Released::View(103),
                Released::Swapchain(42),
            ]
        );
    }

    #[test]
    fn failed_create_registers_nothing() {
        let mut driver = FakeDriver::with_images(3);
        driver.create_result = vk::Result::ERROR_SURFACE_LOST_KHR;
        let mut teardown = TeardownSequencer::new();

        let err = build_chain(&driver, vk::SurfaceKHR::null(), &chain_config(3), &mut teardown)
            .unwrap_err();
        assert_eq!(
            err,
            BootstrapError::SwapchainCreationFailed(vk::Result::ERROR_SURFACE_LOST_KHR)
        );
        assert!(teardown.is_empty());
    }

    #[test]
    fn failed_image_query_releases_only_the_swapchain() {
        let driver = FakeDriver::with_images(2);
        let mut teardown = TeardownSequencer::new();

        let err = build_chain(&driver, vk::SurfaceKHR::null(), &chain_config(3), &mut teardown)
            .unwrap_err();
        assert!(matches!(err, BootstrapError::SwapchainImageQueryFailed { .. }));
        assert!(teardown.is_registered(Stage::Swapchain));
        assert!(!teardown.is_registered(Stage::ImageViews));

        teardown.run();
        assert_eq!(driver.released(), vec![Released::Swapchain(42)]);
    }

    #[test]
    fn failed_view_registers_no_views() {
        let mut driver = FakeDriver::with_images(3);
        driver.failing_view_image = Some(2);
        let mut teardown = TeardownSequencer::new();

        let err = build_chain(&driver, vk::SurfaceKHR::null(), &chain_config(3), &mut teardown)
            .unwrap_err();
        assert_eq!(
            err,
            BootstrapError::ImageViewCreationFailed {
                index: 1,
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        );
        assert!(!teardown.is_registered(Stage::ImageViews));
        // The one view made before the failure is already gone.
        assert_eq!(driver.released(), vec![Released::View(101)]);

        teardown.run();
        assert_eq!(
            driver.released(),
            vec![Released::View(101), Released::Swapchain(42)]
        );
    }

    #[test]
    fn views_are_index_aligned_with_images() {
        let images: Vec<vk::Image> = (1..=3).map(vk::Image::from_raw).collect();
        let mut sources = Vec::new();
        let views = create_image_views(
            &images,
            vk::Format::B8G8R8A8_SRGB,
            |info| {
                assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
                assert_eq!(info.format, vk::Format::B8G8R8A8_SRGB);
                assert_eq!(info.components.r, vk::ComponentSwizzle::R);
                assert_eq!(info.components.a, vk::ComponentSwizzle::A);
                assert_eq!(info.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
                assert_eq!(info.subresource_range.level_count, 1);
                assert_eq!(info.subresource_range.layer_count, 1);
                sources.push(info.image);
                Ok(vk::ImageView::from_raw(info.image.as_raw() + 100))
            },
            |_| panic!("nothing should be destroyed"),
        )
        .unwrap();

        assert_eq!(views.len(), images.len());
        assert_eq!(sources, images);
        for (image, view) in images.iter().zip(&views) {
            assert_eq!(view.as_raw(), image.as_raw() + 100);
        }
    }

    #[test]
    fn view_failure_aborts_and_releases_partial_views() {
        let images: Vec<vk::Image> = (1..=4).map(vk::Image::from_raw).collect();
        let mut destroyed = Vec::new();
        let err = create_image_views(
            &images,
            vk::Format::B8G8R8A8_SRGB,
            |info| {
                if info.image.as_raw() == 3 {
                    Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
                } else {
                    Ok(vk::ImageView::from_raw(info.image.as_raw() + 100))
                }
            },
            |view| destroyed.push(view.as_raw()),
        )
        .unwrap_err();

        assert_eq!(
            err,
            BootstrapError::ImageViewCreationFailed {
                index: 2,
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        );
        assert_eq!(destroyed, vec![102, 101]);
    }
}
