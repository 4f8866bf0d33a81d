// Diagnostics - human readable capability reports
//
// Pure formatting over data that was already enumerated. Missing data
// (no layers, no formats, ...) shows up as a zero count.

use super::api::{ExtensionInfo, LayerInfo, PhysicalAccelerator, SurfaceSupport};
use ash::vk;
use std::fmt::Write;

const RULE: &str = "--------------------------------------------------------------------------";

/// Format a packed Vulkan version as `major.minor.patch`.
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

fn heading(out: &mut String, title: &str, count: usize) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{title}: {count}");
    let _ = writeln!(out, "{RULE}");
}

pub fn layers_report(title: &str, layers: &[LayerInfo]) -> String {
    let mut out = String::new();
    heading(&mut out, title, layers.len());

    for layer in layers {
        let _ = writeln!(out, "Name: {}", layer.name);
        let _ = writeln!(out, "Spec Version: {}", format_version(layer.spec_version));
        let _ = writeln!(out, "Impl Version: {}", layer.implementation_version);
        let _ = writeln!(out, "Description: {}", layer.description);
        let _ = writeln!(out);
    }
    out
}

pub fn extensions_report(title: &str, extensions: &[ExtensionInfo]) -> String {
    let mut out = String::new();
    heading(&mut out, title, extensions.len());

    for extension in extensions {
        let _ = writeln!(out, "Name: {}", extension.name);
        let _ = writeln!(out, "Spec: {}", extension.spec_version);
    }
    out
}

/// Report on the instance: available layers and extensions.
pub fn instance_report(layers: &[LayerInfo], extensions: &[ExtensionInfo]) -> String {
    let mut out = layers_report("Number of instance layers", layers);
    out.push_str(&extensions_report("Number of instance extensions", extensions));
    out
}

/// Report on one accelerator: properties, features, memory, queue
/// families and device layers.
pub fn accelerator_report(accelerator: &PhysicalAccelerator) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Graphics card: {}", accelerator.name);
    let _ = writeln!(
        out,
        "Vulkan API supported version: {}",
        format_version(accelerator.api_version)
    );
    // The driver version encoding is vendor specific.
    let _ = writeln!(out, "Driver version: {}", format_version(accelerator.driver_version));
    let _ = writeln!(out, "Vendor ID: {:#06x}", accelerator.vendor_id);
    let _ = writeln!(out, "Device ID: {:#06x}", accelerator.device_id);
    let _ = writeln!(out, "Device type: {:?}", accelerator.device_type);
    let _ = writeln!(
        out,
        "Discrete queue priorities: {}",
        accelerator.discrete_queue_priorities
    );
    let _ = writeln!(
        out,
        "Geometry shader supported: {}",
        if accelerator.features.geometry_shader == vk::TRUE { "yes" } else { "no" }
    );

    let _ = writeln!(out, "Number of memory types: {}", accelerator.memory_types.len());
    let _ = writeln!(out, "Number of heap types: {}", accelerator.memory_heaps.len());
    for memory_type in &accelerator.memory_types {
        let _ = writeln!(
            out,
            "Heap index: {} {:?}",
            memory_type.heap_index, memory_type.property_flags
        );
    }
    for (index, heap) in accelerator.memory_heaps.iter().enumerate() {
        let _ = writeln!(
            out,
            "Heap {}: {} MiB {:?}",
            index,
            heap.size / (1024 * 1024),
            heap.flags
        );
    }

    out.push_str(&queue_families_report(&accelerator.queue_families));
    out.push_str(&layers_report("Number of device layers", &accelerator.layers));
    out
}

pub fn queue_families_report(families: &[vk::QueueFamilyProperties]) -> String {
    let mut out = String::new();
    heading(&mut out, "Number of queue families", families.len());

    for (index, family) in families.iter().enumerate() {
        let granularity = family.min_image_transfer_granularity;
        let _ = writeln!(out, "Queue family {index}:");
        let _ = writeln!(out, "Queue Count: {}", family.queue_count);
        let _ = writeln!(out, "Timestamp Valid Bits: {}", family.timestamp_valid_bits);
        let _ = writeln!(out, "Flags: {:?}", family.queue_flags);
        let _ = writeln!(
            out,
            "Min Image Transfer Granularity: {}, {}, {}",
            granularity.width, granularity.height, granularity.depth
        );
        let _ = writeln!(out);
    }
    out
}

/// Report on what a surface supports: capabilities, formats, present modes.
pub fn surface_report(support: &SurfaceSupport) -> String {
    let caps = &support.capabilities;
    let mut out = String::new();

    let _ = writeln!(out, "Surface capabilities");
    let _ = writeln!(out, "minImageCount: {}", caps.min_image_count);
    let _ = writeln!(out, "maxImageCount: {}", caps.max_image_count);
    let _ = writeln!(
        out,
        "currentExtent: {}x{}",
        caps.current_extent.width, caps.current_extent.height
    );
    let _ = writeln!(
        out,
        "minImageExtent: {}x{}",
        caps.min_image_extent.width, caps.min_image_extent.height
    );
    let _ = writeln!(
        out,
        "maxImageExtent: {}x{}",
        caps.max_image_extent.width, caps.max_image_extent.height
    );
    let _ = writeln!(out, "maxImageArrayLayers: {}", caps.max_image_array_layers);
    let _ = writeln!(out, "supportedTransforms: {:?}", caps.supported_transforms);
    let _ = writeln!(out, "currentTransform: {:?}", caps.current_transform);
    let _ = writeln!(out, "supportedCompositeAlpha: {:?}", caps.supported_composite_alpha);
    let _ = writeln!(out, "supportedUsageFlags: {:?}", caps.supported_usage_flags);

    let _ = writeln!(out, "Supported surface formats: {}", support.formats.len());
    for format in &support.formats {
        let _ = writeln!(out, "{:?} {:?}", format.format, format.color_space);
    }

    let _ = writeln!(out, "Available present modes: {}", support.present_modes.len());
    for mode in &support.present_modes {
        let _ = writeln!(out, "{mode:?}");
    }
    out
}

/// Write a report to the log, one record per line.
pub fn emit(report: &str, verbose: bool) {
    let level = if verbose { log::Level::Info } else { log::Level::Debug };
    for line in report.lines() {
        log::log!(level, "{}", line);
    }
}
