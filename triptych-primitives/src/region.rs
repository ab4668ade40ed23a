use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// A contiguous byte region addressed by offset.
///
/// # Safety
///
/// The caller must ensure `base` is valid for `len` bytes and that the memory
/// outlives the `Region`. A `Region` is a borrowed view; use [`SharedRegion`]
/// to keep the backing allocation alive across threads.
#[derive(Clone, Copy)]
pub struct Region {
    base: NonNull<u8>,
    len: usize,
}

impl Region {
    /// Create a region from a raw pointer and length.
    ///
    /// # Safety
    ///
    /// - `base` must be valid for reads and writes of `len` bytes
    /// - the memory must remain valid for the lifetime of this Region
    pub unsafe fn from_raw(base: *mut u8, len: usize) -> Self {
        let base = NonNull::new(base).expect("region base must be non-null");
        Self { base, len }
    }

    /// Base pointer of the region.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the region has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn check_range(&self, off: usize, len: usize) {
        assert!(
            off.checked_add(len).is_some_and(|end| end <= self.len),
            "range {off}..{} out of bounds (len={})",
            off + len,
            self.len
        );
    }

    /// Copy `dst.len()` bytes starting at `off` out of the region.
    ///
    /// # Safety
    ///
    /// The source bytes may be concurrently mutated by another thread. The
    /// caller must validate the copy after the fact (e.g. with a sequence
    /// check) before treating it as a consistent record.
    #[inline]
    pub unsafe fn copy_out(&self, off: usize, dst: &mut [u8]) {
        self.check_range(off, dst.len());
        unsafe {
            core::ptr::copy_nonoverlapping(self.as_ptr().add(off), dst.as_mut_ptr(), dst.len())
        };
    }

    /// Copy `src` into the region starting at `off`.
    ///
    /// # Safety
    ///
    /// The caller must be the sole writer of the destination range.
    #[inline]
    pub unsafe fn copy_in(&self, off: usize, src: &[u8]) {
        self.check_range(off, src.len());
        unsafe { core::ptr::copy_nonoverlapping(src.as_ptr(), self.as_ptr().add(off), src.len()) };
    }

    /// Copy `len` bytes from offset `src` to offset `dst` within the region.
    ///
    /// # Safety
    ///
    /// The ranges must not overlap, the source range must be stable for the
    /// duration of the copy, and the caller must be the sole writer of the
    /// destination range.
    #[inline]
    pub unsafe fn copy_between(&self, src: usize, dst: usize, len: usize) {
        self.check_range(src, len);
        self.check_range(dst, len);
        debug_assert!(src + len <= dst || dst + len <= src, "ranges overlap");
        unsafe {
            core::ptr::copy_nonoverlapping(self.as_ptr().add(src), self.as_ptr().add(dst), len)
        };
    }

    /// Mutable view of `len` bytes starting at `off`.
    ///
    /// # Safety
    ///
    /// The caller chooses `'a` and must guarantee that for all of `'a` the
    /// backing memory stays valid and this thread holds exclusive write
    /// access to the range.
    #[inline]
    pub unsafe fn slice_mut<'a>(self, off: usize, len: usize) -> &'a mut [u8] {
        self.check_range(off, len);
        unsafe { core::slice::from_raw_parts_mut(self.as_ptr().add(off), len) }
    }
}

unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region").field("len", &self.len).finish()
    }
}

struct HeapBacking {
    base: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl Drop for HeapBacking {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

unsafe impl Send for HeapBacking {}
unsafe impl Sync for HeapBacking {}

/// A cheaply cloneable handle to a zeroed heap allocation shared between
/// threads. Every clone addresses the same bytes; the allocation is freed
/// when the last handle drops.
#[derive(Clone)]
pub struct SharedRegion {
    backing: Arc<HeapBacking>,
}

impl SharedRegion {
    /// Allocate a zeroed shared region aligned to 64 bytes.
    pub fn zeroed(len: usize) -> Self {
        let layout = Layout::from_size_align(len.max(1), 64).expect("invalid region layout");
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).expect("region allocation failed");
        Self {
            backing: Arc::new(HeapBacking { base, len, layout }),
        }
    }

    /// Borrowed view of the region.
    #[inline]
    pub fn region(&self) -> Region {
        // SAFETY: the backing allocation lives as long as any handle clone.
        unsafe { Region::from_raw(self.backing.base.as_ptr(), self.backing.len) }
    }

    /// Size of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.backing.len
    }

    /// True if the region has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.backing.len == 0
    }

    /// True if both handles address the same allocation.
    #[inline]
    pub fn same_allocation(&self, other: &SharedRegion) -> bool {
        Arc::ptr_eq(&self.backing, &other.backing)
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("len", &self.backing.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_roundtrip() {
        let shared = SharedRegion::zeroed(16);
        let region = shared.region();

        unsafe { region.copy_in(4, &[1, 2, 3, 4]) };

        let mut out = [0u8; 4];
        unsafe { region.copy_out(4, &mut out) };
        assert_eq!(out, [1, 2, 3, 4]);

        // Untouched bytes stay zeroed.
        let mut head = [0xffu8; 4];
        unsafe { region.copy_out(0, &mut head) };
        assert_eq!(head, [0, 0, 0, 0]);
    }

    #[test]
    fn copy_between_slots() {
        let shared = SharedRegion::zeroed(12);
        let region = shared.region();

        unsafe { region.copy_in(0, &[7, 8, 9, 10]) };
        unsafe { region.copy_between(0, 8, 4) };

        let mut out = [0u8; 4];
        unsafe { region.copy_out(8, &mut out) };
        assert_eq!(out, [7, 8, 9, 10]);
    }

    #[test]
    fn clones_alias_the_same_bytes() {
        let a = SharedRegion::zeroed(8);
        let b = a.clone();
        assert!(a.same_allocation(&b));

        unsafe { a.region().copy_in(0, &[42]) };
        let mut out = [0u8; 1];
        unsafe { b.region().copy_out(0, &mut out) };
        assert_eq!(out[0], 42);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_bounds_copy_panics() {
        let shared = SharedRegion::zeroed(4);
        let mut out = [0u8; 8];
        unsafe { shared.region().copy_out(0, &mut out) };
    }
}
