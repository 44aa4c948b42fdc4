// device.rs -- GPU device context: adapter, device, queue, kernel library.
//
// Created once when the launch pad is constructed; read-only for the rest
// of the process. There is no degraded mode: if any of the handles cannot
// be acquired the whole launch pad fails to construct.
//
// ADAPTER SELECTION
// ──────────────────
// wgpu's default `request_adapter` heuristics can hand back a software
// rasterizer (llvmpipe and friends) even when real hardware is present.
// We enumerate explicitly and pick in tiers: real hardware first, then
// virtual/other device types, then whatever exists as a last resort. The
// chosen adapter is logged so a surprising pick is at least visible.

use std::fmt;

use crate::error::LaunchError;
use crate::library::{ShaderLibrary, KERNELS_WGSL};

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.name, self.backend, self.device_type
        )
    }
}

/// The device context: compute device, its submission queue, and the
/// compiled kernel library.
///
/// # Field drop order
/// Rust drops struct fields in declaration order. `_instance` is declared
/// last so the `wgpu::Instance` outlives the device-level objects that
/// hold back-references into it.
pub struct DeviceContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) library: ShaderLibrary,
    pub(crate) adapter_info: AdapterInfo,
    _instance: wgpu::Instance,
}

impl DeviceContext {
    /// Acquire the compute device, its queue, and compile the embedded
    /// kernel library.
    ///
    /// # Errors
    /// `ResourceUnavailable` naming the API that produced no usable
    /// handle: `request_adapter`, `request_device`, or
    /// `create_shader_module`. All are fatal to the launch pad.
    pub fn new() -> Result<Self, LaunchError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, LaunchError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        for a in &adapters {
            let info = a.get_info();
            log::debug!(
                "adapter: {} ({:?}, {:?})",
                info.name,
                info.backend,
                info.device_type
            );
        }

        // Tier 1: real hardware. Tier 2: virtual/other (VM pass-through
        // and translation layers). Tier 3: anything, software included.
        let pick = |adapters: &[wgpu::Adapter], types: &[wgpu::DeviceType]| {
            adapters
                .iter()
                .position(|a| types.contains(&a.get_info().device_type))
        };
        let index = pick(
            &adapters,
            &[wgpu::DeviceType::DiscreteGpu, wgpu::DeviceType::IntegratedGpu],
        )
        .or_else(|| {
            pick(
                &adapters,
                &[wgpu::DeviceType::VirtualGpu, wgpu::DeviceType::Other],
            )
        })
        .or_else(|| if adapters.is_empty() { None } else { Some(0) });

        let mut adapters = adapters;
        let adapter = match index {
            Some(i) => adapters.swap_remove(i),
            None => {
                return Err(LaunchError::ResourceUnavailable {
                    api: "request_adapter",
                })
            }
        };

        let raw = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw.name.clone(),
            vendor: raw.vendor,
            device: raw.device,
            device_type: raw.device_type,
            backend: raw.backend,
        };
        log::info!("using adapter: {adapter_info}");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gantry"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| {
                log::debug!("request_device failed: {e}");
                LaunchError::ResourceUnavailable {
                    api: "request_device",
                }
            })?;

        let library = ShaderLibrary::compile(&device, KERNELS_WGSL)?;

        Ok(DeviceContext {
            device,
            queue,
            library,
            adapter_info,
            _instance: instance,
        })
    }

    /// The byte alignment every storage-buffer binding offset must meet
    /// on this device.
    pub(crate) fn storage_offset_alignment(&self) -> u32 {
        self.device.limits().min_storage_buffer_offset_alignment
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceContext {{ adapter: {} }}", self.adapter_info)
    }
}
