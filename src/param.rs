// param.rs -- dispatch geometry and the typed kernel parameter list.

use std::fmt;

/// A 3-dimensional extent (x, y, z). Used both for the workgroup count
/// of a dispatch and for the threads-per-workgroup a kernel declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Extent {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Extent { x, y, z }
    }

    /// Total invocation count (x * y * z).
    pub fn count(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

impl From<(u32, u32, u32)> for Extent {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Extent { x, y, z }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dispatch geometry for one kernel launch.
///
/// `grid` is the number of workgroups per dimension handed to the device;
/// `group` is the threads-per-workgroup the caller expects. The group
/// extent is validated against the `@workgroup_size` the kernel was
/// compiled with, because WGSL bakes the group size into the shader and
/// a silent disagreement would change how much work actually runs.
///
/// Supplied fresh per dispatch call; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchContext {
    pub grid: Extent,
    pub group: Extent,
}

impl LaunchContext {
    pub fn new(grid: impl Into<Extent>, group: impl Into<Extent>) -> Self {
        LaunchContext {
            grid: grid.into(),
            group: group.into(),
        }
    }
}

/// One typed kernel parameter.
///
/// An ordered slice of these is supplied per dispatch call; parameter i
/// binds at `@group(0) @binding(i)`. The enum is closed: every variant
/// consumes a binding slot, so the parameter list and the kernel's
/// binding interface can never silently desynchronize.
///
/// - `Buffer`: a pointer into a registered host region. Resolved to the
///   owning buffer plus byte offset and bound as a storage buffer.
/// - `Float` / `Int`: a 4-byte scalar, bound as a single-value uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelParam {
    Buffer(*mut u8),
    Float(f32),
    Int(i32),
}

impl From<*mut u8> for KernelParam {
    fn from(p: *mut u8) -> Self {
        KernelParam::Buffer(p)
    }
}

impl From<f32> for KernelParam {
    fn from(v: f32) -> Self {
        KernelParam::Float(v)
    }
}

impl From<i32> for KernelParam {
    fn from(v: i32) -> Self {
        KernelParam::Int(v)
    }
}
