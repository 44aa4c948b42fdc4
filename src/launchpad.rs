// launchpad.rs -- the public facade over device, cache, registry, session.
//
// One LaunchPad per process is the expected shape: construction acquires
// the device and compiles the kernel library, both of which are
// expensive and unrepeatable-on-failure. The facade owns all four
// components exclusively and wires them together so callers deal with
// one value.
//
// The API is synchronous and single-threaded by design: no internal
// locking, no thread-safety guarantee. The raw pointers held by the
// buffer registry make the type `!Send + !Sync`, so the compiler
// enforces the external-serialization requirement.

use std::fmt;

use crate::device::{AdapterInfo, DeviceContext};
use crate::error::LaunchError;
use crate::param::{KernelParam, LaunchContext};
use crate::pipeline::PipelineCache;
use crate::registry::BufferRegistry;
use crate::session::{DispatchSession, SessionState};

/// The compute-kernel launch pad.
///
/// Register host memory regions and kernel names up front, then
/// interleave [`dispatch`](Self::dispatch) and
/// [`commit`](Self::commit) calls. Results of a batch are visible in
/// the registered host memory after a `commit(true)` returns.
pub struct LaunchPad {
    context: DeviceContext,
    pipelines: PipelineCache,
    buffers: BufferRegistry,
    session: DispatchSession,
}

impl LaunchPad {
    /// Acquire the device, compile the embedded kernel library, and
    /// stand up an empty dispatch session.
    ///
    /// # Errors
    /// `ResourceUnavailable` naming the API that failed. Fatal; there
    /// is no degraded mode.
    pub fn new() -> Result<Self, LaunchError> {
        let context = DeviceContext::new()?;
        let session = DispatchSession::new(&context);
        Ok(LaunchPad {
            context,
            pipelines: PipelineCache::new(),
            buffers: BufferRegistry::new(),
            session,
        })
    }

    /// Compile the named library kernel and cache it for dispatch.
    /// Re-registering a name overwrites the cached pipeline.
    ///
    /// # Errors
    /// `KernelNotFound`, `PipelineCompilationFailed`.
    pub fn register_kernel(&mut self, name: &str) -> Result<(), LaunchError> {
        self.pipelines.register(&self.context, name)
    }

    /// Wrap caller-owned memory as a GPU-visible buffer. Returns the
    /// registration index. See [`BufferRegistry::register`] for the
    /// size rules.
    ///
    /// # Errors
    /// `BufferCreationFailed`.
    ///
    /// # Safety
    /// `[addr, addr + len)` must be memory the caller owns, valid and
    /// unmoved for the lifetime of this launch pad, written by the
    /// caller only between a `commit(true)` and the next `commit`, and
    /// not borrowed across `commit` calls (the launch pad reads it at
    /// commit and writes it back after a wait).
    pub unsafe fn register_buffer(
        &mut self,
        addr: *mut u8,
        len: usize,
    ) -> Result<usize, LaunchError> {
        self.buffers.register(&self.context, addr, len)
    }

    /// Resolve an arbitrary pointer to (buffer index, byte offset).
    ///
    /// # Errors
    /// `BufferNotFound`.
    pub fn resolve_buffer(&self, addr: *const u8) -> Result<(usize, u64), LaunchError> {
        self.buffers.resolve(addr)
    }

    /// Encode one kernel dispatch into the current batch. Parameter i
    /// binds at slot i; nothing executes until [`commit`](Self::commit).
    ///
    /// # Errors
    /// `KernelNotRegistered`, `GroupMismatch`, `BufferNotFound`,
    /// `UnalignedOffset`. A failed dispatch leaves the session usable.
    pub fn dispatch(
        &mut self,
        name: &str,
        launch: LaunchContext,
        params: &[KernelParam],
    ) -> Result<(), LaunchError> {
        self.session.dispatch(
            &self.context,
            &self.pipelines,
            &self.buffers,
            name,
            launch,
            params,
        )
    }

    /// Submit the current batch and open a fresh one. With `wait`, also
    /// block until the device finishes and GPU results are written back
    /// into the registered host memory; without it, return at hand-off
    /// and make no completion promise.
    ///
    /// # Errors
    /// `ResourceUnavailable` (fatal class).
    pub fn commit(&mut self, wait: bool) -> Result<(), LaunchError> {
        self.session.commit(&self.context, &self.buffers, wait)
    }

    /// Current session lifecycle state (Idle after a commit, Encoding
    /// after a dispatch).
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the named kernel is currently registered.
    pub fn is_kernel_registered(&self, name: &str) -> bool {
        self.pipelines.is_registered(name)
    }

    /// Number of registered buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of registered kernels.
    pub fn kernel_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Names of every kernel available in the embedded library.
    pub fn library_kernels(&self) -> impl Iterator<Item = &str> {
        self.context.library.kernel_names()
    }

    /// The adapter the launch pad is running on.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.context.adapter_info
    }
}

impl fmt::Display for LaunchPad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LaunchPad {{ adapter: {}, kernels: {}, buffers: {} }}",
            self.context.adapter_info,
            self.pipelines.len(),
            self.buffers.len()
        )
    }
}
