// Device context builder
//
// Responsibilities:
// - Enumerate physical accelerators
// - Pick one through a pluggable scoring policy
// - Logical device + queue creation
// - Presentation support check against the window surface

use super::api::{DeviceDesc, GraphicsApi, PhysicalAccelerator};
use super::error::{RendererError, Result, VkResultExt};
use ash::vk;
use serde::Deserialize;
use std::ffi::{CStr, CString};

/// The only queue family the device context allocates from. No
/// capability matching is done across families.
pub const QUEUE_FAMILY_INDEX: u32 = 0;

/// All queues get the same priority.
pub const QUEUE_PRIORITY: f32 = 1.0;

/// Extensions every logical device must support.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Scores accelerators for selection. `None` rules an accelerator out;
/// the highest score wins and ties go to the lowest index.
pub trait SelectionPolicy {
    fn score(&self, accelerator: &PhysicalAccelerator) -> Option<u64>;
}

/// Always the first enumerated accelerator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl SelectionPolicy for FirstAvailable {
    fn score(&self, _accelerator: &PhysicalAccelerator) -> Option<u64> {
        Some(0)
    }
}

/// Discrete over integrated over everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferDiscrete;

impl SelectionPolicy for PreferDiscrete {
    fn score(&self, accelerator: &PhysicalAccelerator) -> Option<u64> {
        Some(match accelerator.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
            _ => 1,
        })
    }
}

/// Most device-local memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLargestMemory;

impl SelectionPolicy for PreferLargestMemory {
    fn score(&self, accelerator: &PhysicalAccelerator) -> Option<u64> {
        Some(accelerator.device_local_memory())
    }
}

/// Policy names accepted in the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorPreference {
    #[default]
    First,
    Discrete,
    Memory,
}

impl SelectionPolicy for AcceleratorPreference {
    fn score(&self, accelerator: &PhysicalAccelerator) -> Option<u64> {
        match self {
            AcceleratorPreference::First => FirstAvailable.score(accelerator),
            AcceleratorPreference::Discrete => PreferDiscrete.score(accelerator),
            AcceleratorPreference::Memory => PreferLargestMemory.score(accelerator),
        }
    }
}

/// Logical device and the queues allocated on it.
#[derive(Debug)]
pub struct LogicalDeviceContext {
    pub handle: vk::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue_family_index: u32,
    pub queues: Vec<vk::Queue>,
}

impl LogicalDeviceContext {
    /// Wait for the device to go idle, then destroy it. Every child object
    /// must already be gone.
    pub fn destroy<A: GraphicsApi>(self, api: &mut A) {
        if let Err(e) = api.device_wait_idle(self.handle).check("vkDeviceWaitIdle") {
            log::warn!("Destroying device without idle wait: {}", e);
        }
        api.destroy_device(self.handle);
        log::info!("Destroyed logical device");
    }
}

pub fn enumerate_physical_accelerators<A: GraphicsApi>(
    api: &A,
    instance: vk::Instance,
) -> Result<Vec<PhysicalAccelerator>> {
    let devices = api
        .enumerate_physical_devices(instance)
        .check("vkEnumeratePhysicalDevices")?;

    if devices.is_empty() {
        return Err(RendererError::NoAccelerator);
    }

    log::info!("Number of available GPUs: {}", devices.len());

    devices
        .into_iter()
        .map(|device| {
            api.describe_physical_device(device)
                .check("describe physical device")
        })
        .collect()
}

/// Index of the accelerator the policy scores highest.
pub fn select<P: SelectionPolicy + ?Sized>(
    accelerators: &[PhysicalAccelerator],
    policy: &P,
) -> Result<usize> {
    if accelerators.is_empty() {
        return Err(RendererError::NoAccelerator);
    }

    let mut best: Option<(usize, u64)> = None;
    for (index, accelerator) in accelerators.iter().enumerate() {
        let Some(score) = policy.score(accelerator) else {
            continue;
        };
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
        .ok_or(RendererError::NoSuitableAccelerator(accelerators.len()))
}

pub fn create_logical_device<A: GraphicsApi>(
    api: &mut A,
    accelerator: &PhysicalAccelerator,
    requested_queue_count: u32,
    required_extensions: &[&CStr],
) -> Result<LogicalDeviceContext> {
    log::info!("Creating logical device on {}", accelerator.name);

    let family = accelerator
        .queue_families
        .get(QUEUE_FAMILY_INDEX as usize)
        .ok_or(RendererError::MissingQueueFamily(QUEUE_FAMILY_INDEX))?;

    if requested_queue_count == 0 || requested_queue_count > family.queue_count {
        return Err(RendererError::QueueCountUnsupported {
            family: QUEUE_FAMILY_INDEX,
            requested: requested_queue_count,
            available: family.queue_count,
        });
    }

    for extension in required_extensions {
        let name = extension.to_string_lossy();
        if !accelerator.supports_extension(&name) {
            return Err(RendererError::ExtensionNotSupported(name.into_owned()));
        }
    }

    let desc = DeviceDesc {
        queue_family_index: QUEUE_FAMILY_INDEX,
        queue_priorities: vec![QUEUE_PRIORITY; requested_queue_count as usize],
        extensions: required_extensions
            .iter()
            .map(|ext| CString::from(*ext))
            .collect(),
    };

    let handle = api
        .create_device(accelerator.handle, &desc)
        .check("vkCreateDevice")?;

    let queues = (0..requested_queue_count)
        .map(|index| api.device_queue(handle, QUEUE_FAMILY_INDEX, index))
        .collect();

    log::info!(
        "Created logical device with {} queue(s) from family {}",
        requested_queue_count,
        QUEUE_FAMILY_INDEX
    );

    Ok(LogicalDeviceContext {
        handle,
        physical_device: accelerator.handle,
        queue_family_index: QUEUE_FAMILY_INDEX,
        queues,
    })
}

/// Whether the device's queue family can present to `surface`. Must be
/// asked before any swapchain is created.
pub fn verify_presentation_support<A: GraphicsApi>(
    api: &A,
    device: &LogicalDeviceContext,
    surface: vk::SurfaceKHR,
) -> Result<bool> {
    api.surface_support(device.physical_device, device.queue_family_index, surface)
        .check("vkGetPhysicalDeviceSurfaceSupportKHR")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{accelerator, destroyed, FailPoint, Journal, MockApi, Object};
    use ash::vk::Handle;

    fn gpus() -> Vec<PhysicalAccelerator> {
        let mut big = accelerator(3, "Big", vk::PhysicalDeviceType::INTEGRATED_GPU, 1);
        big.memory_heaps[0].size = 16 << 30;
        vec![
            accelerator(1, "Cpu", vk::PhysicalDeviceType::CPU, 1),
            accelerator(2, "Discrete", vk::PhysicalDeviceType::DISCRETE_GPU, 1),
            big,
        ]
    }

    #[test]
    fn zero_accelerators_fail_before_device_creation() {
        let mut api = MockApi::new(Journal::default());
        api.accelerators.clear();

        let error = enumerate_physical_accelerators(&api, vk::Instance::from_raw(1)).unwrap_err();

        assert!(matches!(error, RendererError::NoAccelerator));
        assert!(error.is_fatal());
        assert!(!api.called("create_device"));
    }

    #[test]
    fn lost_device_is_still_destroyed() {
        let journal = Journal::default();
        let mut api = MockApi::new(journal.clone());
        let gpu = accelerator(1, "Gpu", vk::PhysicalDeviceType::DISCRETE_GPU, 1);
        let device = create_logical_device(&mut api, &gpu, 1, &REQUIRED_DEVICE_EXTENSIONS).unwrap();
        api.fail = Some(FailPoint::WaitIdle);

        device.destroy(&mut api);

        assert_eq!(destroyed(&journal), vec![Object::Device]);
    }

    #[test]
    fn enumeration_keeps_backend_order() {
        let mut api = MockApi::new(Journal::default());
        api.accelerators = gpus();

        let found = enumerate_physical_accelerators(&api, vk::Instance::from_raw(1)).unwrap();
        let names: Vec<_> = found.iter().map(|gpu| gpu.name.as_str()).collect();
        assert_eq!(names, ["Cpu", "Discrete", "Big"]);
    }

    #[test]
    fn default_policy_picks_first() {
        assert_eq!(select(&gpus(), &FirstAvailable).unwrap(), 0);
        assert_eq!(select(&gpus(), &AcceleratorPreference::default()).unwrap(), 0);
    }

    #[test]
    fn alternative_policies() {
        assert_eq!(select(&gpus(), &PreferDiscrete).unwrap(), 1);
        assert_eq!(select(&gpus(), &PreferLargestMemory).unwrap(), 2);
        assert_eq!(select(&gpus(), &AcceleratorPreference::Memory).unwrap(), 2);
    }

    #[test]
    fn policy_rejecting_everything_is_fatal() {
        struct Nothing;
        impl SelectionPolicy for Nothing {
            fn score(&self, _: &PhysicalAccelerator) -> Option<u64> {
                None
            }
        }

        let error = select(&gpus(), &Nothing).unwrap_err();
        assert!(matches!(error, RendererError::NoSuitableAccelerator(3)));
    }

    #[test]
    fn queue_count_above_family_capacity_is_fatal() {
        let mut api = MockApi::new(Journal::default());
        let gpu = accelerator(1, "Small", vk::PhysicalDeviceType::DISCRETE_GPU, 2);

        let error =
            create_logical_device(&mut api, &gpu, 4, &REQUIRED_DEVICE_EXTENSIONS).unwrap_err();

        assert!(error.is_fatal());
        assert!(matches!(
            error,
            RendererError::QueueCountUnsupported {
                family: 0,
                requested: 4,
                available: 2
            }
        ));
        let text = error.to_string();
        assert!(text.contains("requested 4 queues"));
        assert!(text.contains("capacity of 2"));
        assert!(!api.called("create_device"));
    }

    #[test]
    fn zero_queues_are_rejected() {
        let mut api = MockApi::new(Journal::default());
        let gpu = accelerator(1, "Gpu", vk::PhysicalDeviceType::DISCRETE_GPU, 2);

        let error =
            create_logical_device(&mut api, &gpu, 0, &REQUIRED_DEVICE_EXTENSIONS).unwrap_err();
        assert!(matches!(error, RendererError::QueueCountUnsupported { requested: 0, .. }));
    }

    #[test]
    fn missing_swapchain_extension_is_fatal() {
        let mut api = MockApi::new(Journal::default());
        let mut gpu = accelerator(1, "Headless", vk::PhysicalDeviceType::DISCRETE_GPU, 4);
        gpu.extensions.clear();

        let error =
            create_logical_device(&mut api, &gpu, 1, &REQUIRED_DEVICE_EXTENSIONS).unwrap_err();
        assert!(matches!(error, RendererError::ExtensionNotSupported(ref name) if name == "VK_KHR_swapchain"));
        assert!(!api.called("create_device"));
    }

    #[test]
    fn queues_share_one_family_and_priority() {
        let mut api = MockApi::new(Journal::default());
        let gpu = accelerator(1, "Gpu", vk::PhysicalDeviceType::DISCRETE_GPU, 4);

        let context =
            create_logical_device(&mut api, &gpu, 4, &REQUIRED_DEVICE_EXTENSIONS).unwrap();

        assert_eq!(context.queues.len(), 4);
        assert_eq!(context.queue_family_index, 0);
        let desc = api.device_desc.unwrap();
        assert_eq!(desc.queue_family_index, 0);
        assert_eq!(desc.queue_priorities, vec![1.0; 4]);
        assert_eq!(desc.extensions, vec![CString::from(c"VK_KHR_swapchain")]);
    }

    #[test]
    fn backend_rejection_is_fatal() {
        let mut api = MockApi::new(Journal::default());
        api.fail = Some(crate::backend::testing::FailPoint::CreateDevice);
        let gpu = accelerator(1, "Gpu", vk::PhysicalDeviceType::DISCRETE_GPU, 1);

        let error =
            create_logical_device(&mut api, &gpu, 1, &REQUIRED_DEVICE_EXTENSIONS).unwrap_err();
        assert!(matches!(
            error,
            RendererError::Vulkan { code: vk::Result::ERROR_INITIALIZATION_FAILED, .. }
        ));
        assert!(error.is_fatal());
    }

    #[test]
    fn presentation_support_comes_from_backend() {
        let mut api = MockApi::new(Journal::default());
        let gpu = accelerator(1, "Gpu", vk::PhysicalDeviceType::DISCRETE_GPU, 1);
        let context =
            create_logical_device(&mut api, &gpu, 1, &REQUIRED_DEVICE_EXTENSIONS).unwrap();
        let surface = vk::SurfaceKHR::from_raw(9);

        assert!(verify_presentation_support(&api, &context, surface).unwrap());
        api.presentation_supported = false;
        assert!(!verify_presentation_support(&api, &context, surface).unwrap());
    }
}
