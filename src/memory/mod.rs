//! Bulk scratch allocators for the ray evaluation loop.
//!
//! Both arenas hand out memory from large, cache-line aligned blocks and only
//! ever reclaim it in bulk. Allocation takes `&self` so that many scratch
//! records can be alive at once, while the reset takes `&mut self`, which means
//! the borrow checker rejects any record that would outlive it.
//!
//! Neither arena runs destructors for what it stores.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{ArenaError, ArenaResult};

mod arena;
mod object_arena;

pub use arena::MemoryArena;
pub use object_arena::ObjectArena;

/// Alignment of every block and slab handed out by the system allocator.
pub const BLOCK_ALIGN: usize = 64;

/// Minimum machine alignment; untyped request sizes are rounded up to this.
pub const MIN_ALIGN: usize = 8;

/// Round `n` up to a multiple of `align`, which must be a power of two.
#[inline]
pub(crate) fn round_up(n: usize, align: usize) -> ArenaResult<usize> {
    debug_assert!(align.is_power_of_two());
    n.checked_add(align - 1)
        .map(|n| n & !(align - 1))
        .ok_or(ArenaError::LayoutOverflow { bytes: n })
}

/// An owned chunk of raw, uninitialized memory.
pub(crate) struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
    size: usize,
}

// The block exclusively owns its allocation.
unsafe impl Send for Block {}

impl Block {
    pub(crate) fn new(size: usize, align: usize) -> ArenaResult<Self> {
        let align = align.max(BLOCK_ALIGN);
        let layout = Layout::from_size_align(size.max(1), align)
            .map_err(|_| ArenaError::LayoutOverflow { bytes: size })?;

        // Safe since the layout never has a zero size
        let raw = unsafe { alloc::alloc(layout) };
        match NonNull::new(raw) {
            Some(ptr) => Ok(Self { ptr, layout, size }),
            None => {
                tracing::error!(bytes = size, "system allocator refused an arena block");
                Err(ArenaError::OutOfMemory { bytes: size })
            }
        }
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Pointer `offset` bytes into the block. `offset` must not exceed the block size.
    #[inline]
    pub(crate) fn offset(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.size);
        // Safe since the offset stays within (or one past the end of) the allocation
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
