// Swapchain - Window presentation
//
// Fixed policy: 3 images, B8G8R8A8_UNORM in sRGB non-linear, exclusive
// sharing, identity transform, opaque alpha and FIFO (strict vsync).
// The requested image count is checked against the surface limits and
// rejected, never clamped.

use super::api::{GraphicsApi, SurfaceSupport};
use super::device::LogicalDeviceContext;
use super::diagnostics;
use super::error::{RendererError, Result, VkResultExt};
use ash::vk;

pub const IMAGE_COUNT: u32 = 3;
pub const SURFACE_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
pub const COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;
pub const PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl SwapchainState {
    pub fn create<A: GraphicsApi>(
        api: &mut A,
        device: &LogicalDeviceContext,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        verbose: bool,
    ) -> Result<Self> {
        log::info!("Creating swapchain: {}x{}", width, height);

        let support = api
            .surface_capabilities(device.physical_device, surface)
            .check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        diagnostics::emit(&diagnostics::surface_report(&support), verbose);

        check_image_count(&support.capabilities, IMAGE_COUNT)?;
        let extent = choose_extent(&support, width, height);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(IMAGE_COUNT)
            .image_format(SURFACE_FORMAT)
            .image_color_space(COLOR_SPACE)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(PRESENT_MODE)
            .clipped(true);

        let handle = api
            .create_swapchain(device.handle, &create_info)
            .check("vkCreateSwapchainKHR")?;

        let images = match api
            .swapchain_images(device.handle, handle)
            .check("vkGetSwapchainImagesKHR")
        {
            Ok(images) => images,
            Err(e) => {
                api.destroy_swapchain(device.handle, handle);
                return Err(e);
            }
        };

        log::info!("Images in swap chain: {}", images.len());

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match create_image_view(api, device, image) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    for view in image_views.into_iter().rev() {
                        api.destroy_image_view(device.handle, view);
                    }
                    api.destroy_swapchain(device.handle, handle);
                    return Err(e);
                }
            }
        }

        Ok(Self {
            handle,
            images,
            image_views,
            format: SURFACE_FORMAT,
            extent,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Destroy every view, then the swapchain itself.
    pub fn destroy<A: GraphicsApi>(self, api: &mut A, device: &LogicalDeviceContext) {
        for view in self.image_views.into_iter().rev() {
            api.destroy_image_view(device.handle, view);
        }
        api.destroy_swapchain(device.handle, self.handle);
        log::info!("Destroyed swapchain");
    }
}

fn create_image_view<A: GraphicsApi>(
    api: &mut A,
    device: &LogicalDeviceContext,
    image: vk::Image,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(SURFACE_FORMAT)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    api.create_image_view(device.handle, &create_info)
        .check("vkCreateImageView")
}

/// `max_image_count == 0` means no upper limit.
fn check_image_count(caps: &vk::SurfaceCapabilitiesKHR, requested: u32) -> Result<()> {
    let above_max = caps.max_image_count > 0 && requested > caps.max_image_count;
    if requested < caps.min_image_count || above_max {
        return Err(RendererError::ImageCountOutOfRange {
            requested,
            min: caps.min_image_count,
            max: caps.max_image_count,
        });
    }
    Ok(())
}

fn choose_extent(support: &SurfaceSupport, width: u32, height: u32) -> vk::Extent2D {
    let caps = &support.capabilities;
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}
