// pipeline.rs -- the kernel name to compute pipeline cache.
//
// A pipeline is compiled on `register`, stored under its entry-point
// name, and reused by every subsequent dispatch. Re-registering a name
// overwrites the previous entry; nothing is reference-counted and
// entries live until the launch pad is dropped.
//
// Pipelines are created with `layout: None` so wgpu derives the bind
// group layout from the shader's own binding declarations. Dispatch then
// fetches that derived layout with `get_bind_group_layout(0)`, which is
// what lets an ordered parameter list map straight onto binding slots
// without a hand-written layout per kernel.

use std::collections::HashMap;

use crate::device::DeviceContext;
use crate::error::LaunchError;
use crate::param::Extent;

/// A compiled kernel: the executable pipeline plus the workgroup size
/// its shader declares.
pub(crate) struct PipelineEntry {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) workgroup: Extent,
}

/// Maps kernel name to compiled pipeline. Built lazily on registration
/// requests, reused afterward.
#[derive(Default)]
pub struct PipelineCache {
    entries: HashMap<String, PipelineEntry>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the named library kernel into a pipeline and cache it.
    ///
    /// Registering a name that is already cached recompiles and
    /// overwrites the entry, so the call is idempotent from the
    /// caller's perspective.
    ///
    /// # Errors
    /// - `KernelNotFound` if the library has no such entry point.
    /// - `PipelineCompilationFailed` if the device rejects the pipeline.
    pub fn register(
        &mut self,
        ctx: &DeviceContext,
        name: &str,
    ) -> Result<(), LaunchError> {
        let entry = ctx.library.entry_point(name).ok_or_else(|| {
            LaunchError::KernelNotFound {
                name: name.to_string(),
            }
        })?;
        let workgroup = entry.workgroup;

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: None,
                module: &ctx.library.module,
                entry_point: name,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(e) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(LaunchError::PipelineCompilationFailed {
                name: name.to_string(),
                cause: e.to_string(),
            });
        }

        log::debug!("registered kernel `{name}` (workgroup {workgroup})");
        self.entries
            .insert(name.to_string(), PipelineEntry { pipeline, workgroup });
        Ok(())
    }

    /// The cached pipeline for `name`.
    ///
    /// # Errors
    /// `KernelNotRegistered` if `register` was never called for `name`.
    pub(crate) fn lookup(&self, name: &str) -> Result<&PipelineEntry, LaunchError> {
        self.entries
            .get(name)
            .ok_or_else(|| LaunchError::KernelNotRegistered {
                name: name.to_string(),
            })
    }

    /// Whether `name` has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
