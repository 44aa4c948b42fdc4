// error.rs -- the crate-wide error taxonomy.
//
// Every fallible operation in the crate returns `Result<_, LaunchError>`.
// Two classes exist:
//
//   fatal       ResourceUnavailable. An underlying wgpu call that should
//               not fail in practice returned no usable handle (adapter,
//               device, shader module, staging map). There is no degraded
//               mode; the launch pad is unusable after one of these.
//
//   recoverable everything else. The failing call is aborted, the launch
//               pad (and an in-flight dispatch session) stays usable.
//
// Nothing here is logged internally; errors are returned to the immediate
// caller and logging is the caller's concern.

use crate::param::Extent;

/// Errors surfaced by [`LaunchPad`](crate::LaunchPad) and its components.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// An underlying GPU API call returned no usable handle. Fatal: the
    /// launch pad cannot continue after this.
    #[error("GPU API `{api}` returned no usable handle")]
    ResourceUnavailable { api: &'static str },

    /// The named kernel does not exist in the embedded shader library.
    #[error("kernel `{name}` not found in the compiled library")]
    KernelNotFound { name: String },

    /// The named kernel exists but `register_kernel` was never called
    /// for it.
    #[error("kernel `{name}` was never registered")]
    KernelNotRegistered { name: String },

    /// The library contains the named entry point but it failed to
    /// compile into an executable pipeline.
    #[error("pipeline compilation failed for kernel `{name}`: {cause}")]
    PipelineCompilationFailed { name: String, cause: String },

    /// The host memory region could not be wrapped as a GPU buffer
    /// (size or alignment constraint violated, or the device rejected
    /// the allocation).
    #[error("could not wrap host memory as a GPU buffer: {cause}")]
    BufferCreationFailed { cause: String },

    /// A buffer-typed parameter's address falls outside every registered
    /// buffer range. Per-dispatch; does not poison the session.
    #[error("address {addr:#x} is not inside any registered buffer")]
    BufferNotFound { addr: usize },

    /// The launch context's group extent disagrees with the workgroup
    /// size the kernel was compiled with. The group size is baked into
    /// the shader, so the caller's extent must match exactly.
    #[error(
        "kernel `{name}` was compiled with workgroup size {declared}, \
         dispatch requested {given}"
    )]
    GroupMismatch {
        name: String,
        given: Extent,
        declared: Extent,
    },

    /// A buffer parameter resolved to a byte offset the device cannot
    /// bind. Storage buffer bindings must start at a multiple of the
    /// device's `min_storage_buffer_offset_alignment`.
    #[error(
        "buffer offset {offset} violates the device's {required}-byte \
         storage binding alignment"
    )]
    UnalignedOffset { offset: u64, required: u32 },
}
