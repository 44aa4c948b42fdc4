// registry.rs -- host memory regions wrapped as GPU-visible buffers.
//
// The caller hands us (address, length) pairs for memory it owns; we
// never allocate or free host memory and never hold more than a
// back-reference to it. Each registration creates two device buffers:
//
//   storage   STORAGE | COPY_SRC | COPY_DST, the buffer kernels bind.
//   staging   MAP_READ | COPY_DST, a persistent readback target sized
//             to the same region (rounded up to wgpu's map alignment).
//
// MIRRORING INSTEAD OF ALIASING
// ──────────────────────────────
// The source platform for this design maps host memory so CPU and GPU
// observe the same bytes. wgpu offers no portable equivalent, so the
// registry mirrors: host bytes are uploaded into `storage` at
// registration and again when a batch that touches the buffer is
// committed; GPU results are copied `storage` -> `staging` at commit and
// written back into the caller's memory when a wait is observed. Under
// the launch pad's access contract (the caller is the sole writer of a
// region before a batch runs and the sole reader after it completes)
// the boundary copies are observationally equivalent to shared memory;
// the difference is bandwidth, not correctness.
//
// Reverse lookup (`resolve`) is a linear first-match scan in
// registration order. Cost grows with buffer count, correctness does
// not; the expected caller registers tens of buffers.

use crate::device::DeviceContext;
use crate::error::LaunchError;

/// One registered host region and its device-side mirror buffers.
pub(crate) struct BufferEntry {
    pub(crate) storage: wgpu::Buffer,
    pub(crate) staging: wgpu::Buffer,
    base: *mut u8,
    len: usize,
}

impl BufferEntry {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// The caller-owned bytes behind this entry.
    ///
    /// # Safety
    /// Relies on the registration contract: the region is valid, unmoved,
    /// and not being written by the caller while a batch that touches it
    /// is in flight.
    pub(crate) unsafe fn host_bytes(&self) -> &[u8] {
        std::slice::from_raw_parts(self.base, self.len)
    }

    /// Overwrite the caller-owned bytes with GPU results.
    ///
    /// # Safety
    /// Same contract as [`host_bytes`], plus: the caller must not hold a
    /// live `&`/`&mut` borrow of the region across the launch pad call
    /// that triggers the writeback.
    pub(crate) unsafe fn write_host_bytes(&self, data: &[u8]) {
        debug_assert!(data.len() >= self.len);
        std::ptr::copy_nonoverlapping(data.as_ptr(), self.base, self.len);
    }
}

/// Append-only list of registered buffers, indexed by registration order.
#[derive(Default)]
pub struct BufferRegistry {
    entries: Vec<BufferEntry>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the byte range `[addr, addr + len)` as a GPU-visible buffer
    /// and upload its current contents. Returns the registration index.
    ///
    /// Ranges registered by distinct calls are assumed non-overlapping;
    /// this is not enforced.
    ///
    /// # Errors
    /// `BufferCreationFailed` if `len` is zero or not a multiple of 4
    /// (device copies operate on 4-byte units), or if the device rejects
    /// the allocation.
    ///
    /// # Safety
    /// The caller owns the region, and it must stay valid and unmoved
    /// for as long as this entry exists and any dispatch referencing it
    /// is in flight. The launch pad reads the region at commit and
    /// writes it on `commit(wait: true)`, so the caller must not hold
    /// borrows of it across those calls.
    pub unsafe fn register(
        &mut self,
        ctx: &DeviceContext,
        addr: *mut u8,
        len: usize,
    ) -> Result<usize, LaunchError> {
        if addr.is_null() || len == 0 {
            return Err(LaunchError::BufferCreationFailed {
                cause: "region is null or empty".to_string(),
            });
        }
        if len % wgpu::COPY_BUFFER_ALIGNMENT as usize != 0 {
            return Err(LaunchError::BufferCreationFailed {
                cause: format!(
                    "length {len} is not a multiple of {}",
                    wgpu::COPY_BUFFER_ALIGNMENT
                ),
            });
        }

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        ctx.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let storage = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gantry storage"),
            size: len as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        // Staging is mapped in full, so its size meets the map alignment
        // even when `len` does not.
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gantry staging"),
            size: align_to(len as u64, wgpu::MAP_ALIGNMENT),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let oom = pollster::block_on(ctx.device.pop_error_scope());
        let validation = pollster::block_on(ctx.device.pop_error_scope());
        if let Some(e) = oom.or(validation) {
            return Err(LaunchError::BufferCreationFailed {
                cause: e.to_string(),
            });
        }

        let entry = BufferEntry {
            storage,
            staging,
            base: addr,
            len,
        };
        // Initial upload: the mirror starts as a copy of the host bytes.
        ctx.queue.write_buffer(&entry.storage, 0, entry.host_bytes());

        self.entries.push(entry);
        let index = self.entries.len() - 1;
        log::debug!("registered buffer {index}: {len} bytes at {:p}", addr);
        Ok(index)
    }

    /// Resolve an arbitrary pointer back to (buffer index, byte offset).
    ///
    /// Scans registered buffers in registration order and returns the
    /// first whose range contains `addr`.
    ///
    /// # Errors
    /// `BufferNotFound` if no registered range contains the address.
    pub fn resolve(&self, addr: *const u8) -> Result<(usize, u64), LaunchError> {
        let ranges = self.entries.iter().map(|e| (e.base as usize, e.len));
        find_containing(ranges, addr as usize).ok_or(LaunchError::BufferNotFound {
            addr: addr as usize,
        })
    }

    pub(crate) fn entry(&self, index: usize) -> &BufferEntry {
        &self.entries[index]
    }

    /// Number of registered buffers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First-match scan over `(base, len)` half-open byte ranges. Returns
/// the index of the first range containing `addr` and the offset
/// `addr - base`.
///
/// Separated from the registry so the lookup semantics are testable
/// (and benchable) without a device.
pub fn find_containing<I>(ranges: I, addr: usize) -> Option<(usize, u64)>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    ranges.into_iter().enumerate().find_map(|(i, (base, len))| {
        if addr >= base && addr < base + len {
            Some((i, (addr - base) as u64))
        } else {
            None
        }
    })
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
pub(crate) fn align_to(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    // resolve() semantics are fully determined by find_containing, which
    // needs no device.

    #[test]
    fn every_interior_address_resolves_with_its_offset() {
        let ranges = [(0x1000, 64), (0x2000, 16)];
        for a in 0x1000..0x1040 {
            assert_eq!(find_containing(ranges, a), Some((0, (a - 0x1000) as u64)));
        }
        for a in 0x2000..0x2010 {
            assert_eq!(find_containing(ranges, a), Some((1, (a - 0x2000) as u64)));
        }
    }

    #[test]
    fn range_ends_are_exclusive() {
        let ranges = [(0x1000, 64)];
        assert_eq!(find_containing(ranges, 0x0fff), None);
        assert_eq!(find_containing(ranges, 0x1040), None);
        assert_eq!(find_containing(ranges, 0x103f), Some((0, 63)));
    }

    #[test]
    fn outside_every_range_is_a_miss() {
        let ranges = [(0x1000, 64), (0x2000, 16)];
        assert_eq!(find_containing(ranges, 0x0), None);
        assert_eq!(find_containing(ranges, 0x1800), None);
        assert_eq!(find_containing(ranges, 0x5000), None);
    }

    #[test]
    fn first_containing_range_wins() {
        // Overlap is not enforced against; the scan promises first-match.
        let ranges = [(0x1000, 0x100), (0x1080, 0x100)];
        assert_eq!(find_containing(ranges, 0x1090), Some((0, 0x90)));
        assert_eq!(find_containing(ranges, 0x1100), Some((1, 0x80)));
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        assert_eq!(find_containing(std::iter::empty::<(usize, usize)>(), 0x1000), None);
    }

    #[test]
    fn align_to_rounds_up() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(1, 8), 8);
        assert_eq!(align_to(8, 8), 8);
        assert_eq!(align_to(9, 8), 16);
        assert_eq!(align_to(100, 256), 256);
    }
}
