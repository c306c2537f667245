// SPDX-License-Identifier: CEPL-1.0
//! Instance, surface, device and allocator: everything that lives as long as the window.
use crate::error::{RenderError, Result, VkResultExt};
use ash::{
    ext::debug_utils,
    khr::{surface, swapchain},
    vk, Entry, Instance,
};
use prism_render::Host;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_void, CStr};
use std::mem::ManuallyDrop;
use tracing::{debug, error, info, trace, warn};

pub(crate) const API_VERSION: u32 = vk::API_VERSION_1_1;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const APP_NAME: &CStr = c"prism";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Picks queue families from `(flags, can_present)` per family index.
/// A family doing both wins; otherwise the first graphics and first present family.
pub(crate) fn choose_queue_families(
    families: &[(vk::QueueFlags, bool)],
) -> Option<QueueFamilies> {
    if let Some(i) = families
        .iter()
        .position(|(flags, present)| flags.contains(vk::QueueFlags::GRAPHICS) && *present)
    {
        return Some(QueueFamilies { graphics: i as u32, present: i as u32 });
    }
    let graphics = families
        .iter()
        .position(|(flags, _)| flags.contains(vk::QueueFlags::GRAPHICS))?;
    let present = families.iter().position(|(_, present)| *present)?;
    Some(QueueFamilies { graphics: graphics as u32, present: present as u32 })
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

struct Debug {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

pub struct Context {
    _entry: Entry,
    pub instance: Instance,
    debug: Option<Debug>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub phys: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    allocator: ManuallyDrop<vk_mem::Allocator>,
}

impl Context {
    // STRICT ORDER:
    // 1) instance (WSI extensions from the display handle, debug utils when validating)
    // 2) surface FROM THIS INSTANCE
    // 3) physical device + queue families checked AGAINST THIS SURFACE
    // 4) logical device, queues, swapchain loader
    // 5) allocator bound to (instance, device, phys)
    pub unsafe fn new<H: Host + ?Sized>(host: &H, validation: bool) -> Result<Self> {
        let display = host
            .display_handle()
            .map_err(|e| RenderError::Surface { stage: "display_handle", reason: e.to_string() })?
            .as_raw();
        let window = host
            .window_handle()
            .map_err(|e| RenderError::Surface { stage: "window_handle", reason: e.to_string() })?
            .as_raw();

        let entry = Entry::load()?;
        let validation = validation && validation_available(&entry);
        let instance = create_instance(&entry, display, validation)?;

        let debug = if validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("vk: debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = ash_window::create_surface(&entry, &instance, display, window, None)
            .surface("create_surface")?;

        let (phys, families) = pick_physical_device(&instance, &surface_loader, surface)?;
        let device = create_device(&instance, phys, families)?;
        let graphics_queue = device.get_device_queue(families.graphics, 0);
        let present_queue = device.get_device_queue(families.present, 0);
        let swapchain_loader = swapchain::Device::new(&instance, &device);

        let mut alloc_info = vk_mem::AllocatorCreateInfo::new(&instance, &device, phys);
        alloc_info.vulkan_api_version = API_VERSION;
        let allocator = vk_mem::Allocator::new(alloc_info).init("create_allocator")?;

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            families,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
            allocator: ManuallyDrop::new(allocator),
        })
    }

    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    pub unsafe fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR> {
        self.surface_loader
            .get_physical_device_surface_capabilities(self.phys, self.surface)
            .surface("get_surface_capabilities")
    }

    /// Waits on both queues, then on the whole device. Errors are ignored: this
    /// runs on teardown paths where there is nothing left to do about them.
    pub fn wait_idle(&self) {
        unsafe {
            let _ = self.device.queue_wait_idle(self.graphics_queue);
            if self.present_queue != self.graphics_queue {
                let _ = self.device.queue_wait_idle(self.present_queue);
            }
            let _ = self.device.device_wait_idle();
        }
    }
}

// STRICT TEARDOWN ORDER (after the renderer has released every device object):
// allocator -> device -> surface -> debug messenger -> instance
impl Drop for Context {
    fn drop(&mut self) {
        self.wait_idle();
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(d) = self.debug.take() {
                d.loader.destroy_debug_utils_messenger(d.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("vk: context destroyed");
    }
}

unsafe fn validation_available(entry: &Entry) -> bool {
    let layers = entry.enumerate_instance_layer_properties().unwrap_or_default();
    let found = layers
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == VALIDATION_LAYER);
    if !found {
        warn!("vk: validation requested but {VALIDATION_LAYER:?} is not installed");
    }
    found
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: API_VERSION,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .surface("enumerate_required_extensions")?
        .to_vec();
    if validation {
        extensions.push(debug_utils::NAME.as_ptr());
    }
    let layers = [VALIDATION_LAYER.as_ptr()];

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: if validation { layers.len() as u32 } else { 0 },
        pp_enabled_layer_names: if validation { layers.as_ptr() } else { std::ptr::null() },
        ..Default::default()
    };

    let instance = entry.create_instance(&create_info, None).init("create_instance")?;
    info!("vk: instance created (validation={validation})");
    Ok(instance)
}

unsafe fn create_debug_messenger(entry: &Entry, instance: &Instance) -> Result<Debug> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = loader
        .create_debug_utils_messenger(&ci, None)
        .init("create_debug_utils_messenger")?;
    Ok(Debug { loader, messenger })
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = instance
        .enumerate_physical_devices()
        .init("enumerate_physical_devices")?;

    let mut fallback = None;
    for phys in devices {
        let props = instance.get_physical_device_properties(phys);
        let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy().into_owned();

        if !has_swapchain_extension(instance, phys) {
            debug!("vk: skipping {name}: no {:?}", swapchain::NAME);
            continue;
        }
        let families: Vec<(vk::QueueFlags, bool)> = instance
            .get_physical_device_queue_family_properties(phys)
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let present = surface_loader
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false);
                (q.queue_flags, present)
            })
            .collect();
        let Some(chosen) = choose_queue_families(&families) else {
            debug!("vk: skipping {name}: no graphics/present queue");
            continue;
        };

        if props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            info!("vk: using discrete GPU {name} (queues {chosen:?})");
            return Ok((phys, chosen));
        }
        if fallback.is_none() {
            fallback = Some((phys, chosen, name));
        }
    }

    let (phys, chosen, name) = fallback.ok_or(RenderError::NoSuitableDevice)?;
    info!("vk: using {name} (queues {chosen:?})");
    Ok((phys, chosen))
}

unsafe fn has_swapchain_extension(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME)
}

unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    families: QueueFamilies,
) -> Result<ash::Device> {
    let priorities = [1.0f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let extensions = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };
    instance.create_device(phys, &create_info, None).init("create_device")
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
    const T: vk::QueueFlags = vk::QueueFlags::TRANSFER;

    #[test]
    fn shared_family_is_preferred() {
        let fams = [(G, false), (T, true), (G | T, true)];
        let q = choose_queue_families(&fams).unwrap();
        assert_eq!(q, QueueFamilies { graphics: 2, present: 2 });
        assert_eq!(q.unique(), vec![2]);
    }

    #[test]
    fn split_families_need_two_queue_infos() {
        let fams = [(G, false), (T, true)];
        let q = choose_queue_families(&fams).unwrap();
        assert_eq!(q, QueueFamilies { graphics: 0, present: 1 });
        assert_eq!(q.unique(), vec![0, 1]);
    }

    #[test]
    fn device_without_present_or_graphics_is_rejected() {
        assert_eq!(choose_queue_families(&[(G, false)]), None);
        assert_eq!(choose_queue_families(&[(T, true)]), None);
        assert_eq!(choose_queue_families(&[]), None);
    }
}
