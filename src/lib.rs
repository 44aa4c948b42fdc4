// gantry: a kernel launch pad for wgpu compute.
//
// Registers caller-owned host memory as GPU-visible buffers, compiles
// and caches named WGSL kernels from an embedded library, binds ordered
// typed parameters (buffer pointers and 32-bit scalars) into dispatches,
// and batches dispatches into submissions with explicit commit/wait.
//
// The consumer computes launch geometry and owns all buffer memory;
// gantry owns the device, the pipelines, and the submission lifecycle.

pub mod device;
pub mod error;
pub mod library;
pub mod param;
pub mod pipeline;
pub mod registry;
pub mod session;

mod launchpad;

pub use device::AdapterInfo;
pub use error::LaunchError;
pub use launchpad::LaunchPad;
pub use param::{Extent, KernelParam, LaunchContext};
pub use session::SessionState;
