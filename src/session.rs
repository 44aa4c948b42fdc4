// session.rs -- the dispatch session: encode, batch, commit, wait.
//
// A session is the transient unit of work: one command encoder that
// accumulates compute passes, committed as a single submission. The
// lifecycle is an explicit state machine:
//
//   Idle ──dispatch──▶ Encoding ──commit──▶ Committed ──▶ Idle
//
// Committed is transient: `commit` submits the filled encoder and
// immediately stands up a fresh one, so the session is usable for
// further dispatches without waiting for the GPU. There is no abort
// transition; the only way out of Encoding is `commit`.
//
// A failing dispatch (unregistered kernel, unresolvable pointer,
// mismatched group extent) aborts only that call: every parameter is
// validated and resolved before anything is encoded, so the session's
// encoder and bookkeeping are untouched by the failure.
//
// HOST SYNC AT COMMIT BOUNDARIES
// ───────────────────────────────
// Each commit uploads the host bytes of every buffer the batch touches
// (unless the buffer still carries GPU results that have not been read
// back, in which case the device-side copy is newer and the upload is
// skipped), then encodes storage -> staging copies after the batch's
// passes. A wait drains the device and writes every pending staging
// buffer back into the caller's memory. See registry.rs for why the
// mirroring exists at all.

use wgpu::util::DeviceExt;

use crate::device::DeviceContext;
use crate::error::LaunchError;
use crate::param::{KernelParam, LaunchContext};
use crate::pipeline::PipelineCache;
use crate::registry::BufferRegistry;

/// Observable session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fresh encoder, nothing recorded.
    Idle,
    /// At least one dispatch has been encoded since the last commit.
    Encoding,
    /// Submission handed to the queue; only ever held mid-commit.
    Committed,
}

/// One bound parameter, fully resolved but not yet encoded.
enum PlannedBinding {
    Storage { entry: usize, offset: u64 },
    Scalar { uniform: usize },
}

/// The transient command container and its bookkeeping.
pub struct DispatchSession {
    encoder: wgpu::CommandEncoder,
    state: SessionState,
    /// Registry indices referenced by dispatches in the current batch.
    touched: Vec<usize>,
    /// Registry indices with GPU results copied to staging but not yet
    /// written back to host memory.
    pending_writeback: Vec<usize>,
}

impl DispatchSession {
    pub(crate) fn new(ctx: &DeviceContext) -> Self {
        DispatchSession {
            encoder: make_encoder(ctx),
            state: SessionState::Idle,
            touched: Vec::new(),
            pending_writeback: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Encode one kernel dispatch into the current batch.
    ///
    /// Parameter i binds at `@group(0) @binding(i)`; see
    /// [`KernelParam`] for the slot rules. Only encodes; nothing runs
    /// until [`commit`](Self::commit).
    ///
    /// # Errors
    /// - `KernelNotRegistered` if `name` was never registered.
    /// - `GroupMismatch` if `launch.group` differs from the kernel's
    ///   compiled workgroup size.
    /// - `BufferNotFound` / `UnalignedOffset` for buffer parameters.
    ///
    /// All errors leave the session exactly as it was.
    pub fn dispatch(
        &mut self,
        ctx: &DeviceContext,
        pipelines: &PipelineCache,
        registry: &BufferRegistry,
        name: &str,
        launch: LaunchContext,
        params: &[KernelParam],
    ) -> Result<(), LaunchError> {
        let kernel = pipelines.lookup(name)?;
        if launch.group != kernel.workgroup {
            return Err(LaunchError::GroupMismatch {
                name: name.to_string(),
                given: launch.group,
                declared: kernel.workgroup,
            });
        }

        // Resolve and validate every parameter before encoding anything,
        // so a failure cannot leave a half-bound pass behind.
        let alignment = ctx.storage_offset_alignment();
        let mut plan = Vec::with_capacity(params.len());
        let mut uniforms = Vec::new();
        let mut batch_touched = Vec::new();
        for param in params {
            match *param {
                KernelParam::Buffer(p) => {
                    let (entry, offset) = registry.resolve(p)?;
                    if offset % alignment as u64 != 0 {
                        return Err(LaunchError::UnalignedOffset {
                            offset,
                            required: alignment,
                        });
                    }
                    if !batch_touched.contains(&entry) {
                        batch_touched.push(entry);
                    }
                    plan.push(PlannedBinding::Storage { entry, offset });
                }
                KernelParam::Float(v) => {
                    uniforms.push(make_scalar_uniform(ctx, bytemuck::bytes_of(&v)));
                    plan.push(PlannedBinding::Scalar {
                        uniform: uniforms.len() - 1,
                    });
                }
                KernelParam::Int(v) => {
                    uniforms.push(make_scalar_uniform(ctx, bytemuck::bytes_of(&v)));
                    plan.push(PlannedBinding::Scalar {
                        uniform: uniforms.len() - 1,
                    });
                }
            }
        }

        let entries: Vec<wgpu::BindGroupEntry> = plan
            .iter()
            .enumerate()
            .map(|(slot, binding)| wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: match *binding {
                    PlannedBinding::Storage { entry, offset } => {
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &registry.entry(entry).storage,
                            offset,
                            size: None,
                        })
                    }
                    PlannedBinding::Scalar { uniform } => {
                        uniforms[uniform].as_entire_binding()
                    }
                },
            })
            .collect();

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &kernel.pipeline.get_bind_group_layout(0),
            entries: &entries,
        });

        {
            let mut pass = self
                .encoder
                .begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(name),
                    timestamp_writes: None,
                });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(launch.grid.x, launch.grid.y, launch.grid.z);
        }

        for entry in batch_touched {
            if !self.touched.contains(&entry) {
                self.touched.push(entry);
            }
        }
        self.state = SessionState::Encoding;
        Ok(())
    }

    /// Close the current batch, submit it, and stand up a fresh one.
    ///
    /// Returns as soon as the submission is handed off unless `wait` is
    /// true, in which case it blocks until the device has finished the
    /// batch and every touched buffer's results are visible in the
    /// caller's host memory again.
    ///
    /// # Errors
    /// `ResourceUnavailable` if a staging buffer cannot be mapped during
    /// the wait. Fatal class, same as device init failure.
    pub fn commit(
        &mut self,
        ctx: &DeviceContext,
        registry: &BufferRegistry,
        wait: bool,
    ) -> Result<(), LaunchError> {
        // Results of this batch land in staging; encode the copies after
        // the batch's passes, inside the same submission.
        for &index in &self.touched {
            let entry = registry.entry(index);
            self.encoder.copy_buffer_to_buffer(
                &entry.storage,
                0,
                &entry.staging,
                0,
                entry.len() as u64,
            );
        }

        // Upload current host bytes for the batch's buffers. Skipped for
        // buffers whose device copy holds un-read-back results from an
        // earlier batch: the access contract says the caller has not
        // written those since, so the device copy is the newer one.
        for &index in &self.touched {
            if self.pending_writeback.contains(&index) {
                continue;
            }
            let entry = registry.entry(index);
            // SAFETY: registration contract (region valid and unmoved,
            // caller not writing it while the batch is in flight).
            ctx.queue
                .write_buffer(&entry.storage, 0, unsafe { entry.host_bytes() });
        }

        let filled = std::mem::replace(&mut self.encoder, make_encoder(ctx));
        ctx.queue.submit(std::iter::once(filled.finish()));
        self.state = SessionState::Committed;

        for index in self.touched.drain(..) {
            if !self.pending_writeback.contains(&index) {
                self.pending_writeback.push(index);
            }
        }

        // The fresh encoder is already in place: the session re-enters
        // Idle immediately, whether or not the caller waits.
        self.state = SessionState::Idle;
        log::debug!(
            "committed batch ({} buffers pending writeback, wait = {wait})",
            self.pending_writeback.len()
        );

        if wait {
            self.wait_and_write_back(ctx, registry)?;
        }
        Ok(())
    }

    /// Block until the device drains, then copy every pending staging
    /// buffer back into the caller's host memory.
    fn wait_and_write_back(
        &mut self,
        ctx: &DeviceContext,
        registry: &BufferRegistry,
    ) -> Result<(), LaunchError> {
        ctx.device.poll(wgpu::Maintain::Wait);

        for index in self.pending_writeback.drain(..) {
            let entry = registry.entry(index);
            let slice = entry.staging.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |r| {
                let _ = tx.send(r);
            });
            ctx.device.poll(wgpu::Maintain::Wait);
            match rx.recv() {
                Ok(Ok(())) => {}
                _ => {
                    return Err(LaunchError::ResourceUnavailable {
                        api: "map_async",
                    })
                }
            }

            let mapped = slice.get_mapped_range();
            // SAFETY: registration contract; the caller asked for the
            // wait, so it holds no borrow of the region right now.
            unsafe { entry.write_host_bytes(&mapped) };
            drop(mapped);
            entry.staging.unmap();
        }
        Ok(())
    }
}

fn make_encoder(ctx: &DeviceContext) -> wgpu::CommandEncoder {
    ctx.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gantry batch"),
        })
}

fn make_scalar_uniform(ctx: &DeviceContext, bytes: &[u8]) -> wgpu::Buffer {
    ctx.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gantry scalar"),
            contents: bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        })
}
