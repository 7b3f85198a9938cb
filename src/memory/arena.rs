use std::cell::{Cell, UnsafeCell};
use std::fmt::{Debug, Formatter};
use std::mem;
use std::ptr::NonNull;
use std::slice;

use crate::error::{ArenaError, ArenaResult};
use crate::memory::{round_up, Block, BLOCK_ALIGN, MIN_ALIGN};

/// Untyped bump allocator with block recycling.
///
/// Requests are served from the current block by bumping a cursor. When a request
/// doesn't fit, the current block is retired to the used list and replaced by a
/// recycled block that is big enough, or by a fresh block of
/// `max(size, block_size)` bytes. [`MemoryArena::free_all`] moves every used block
/// back into the available pool without returning anything to the system, so a
/// steady per-sample workload stops touching the system allocator after warm-up.
///
/// Values placed in the arena are never dropped.
pub struct MemoryArena {
    block_size: usize,
    cur_block_pos: Cell<usize>,
    blocks: UnsafeCell<Blocks>,
}

#[derive(Default)]
struct Blocks {
    current: Option<Block>,
    used: Vec<Block>,
    available: Vec<Block>,
}

// All blocks are owned by the arena. It is not `Sync`, so the interior
// mutability is never reached from two threads at once.
unsafe impl Send for MemoryArena {}

impl MemoryArena {
    pub const DEFAULT_BLOCK_SIZE: usize = 32768;

    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(MIN_ALIGN),
            cur_block_pos: Cell::new(0),
            blocks: UnsafeCell::new(Blocks::default()),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Allocate `size` bytes, rounded up to 8-byte alignment.
    pub fn alloc_bytes(&self, size: usize) -> ArenaResult<NonNull<u8>> {
        self.alloc_layout(size, MIN_ALIGN)
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// # Panics
    /// If `align` is not a power of two or is larger than the block alignment.
    pub fn alloc_layout(&self, size: usize, align: usize) -> ArenaResult<NonNull<u8>> {
        assert!(
            align.is_power_of_two() && align <= BLOCK_ALIGN,
            "MemoryArena supports power of two alignments up to {}, got {}", BLOCK_ALIGN, align
        );
        let size = round_up(size, MIN_ALIGN)?;
        let align = align.max(MIN_ALIGN);

        // Safe since no reference into `Blocks` escapes this function, only
        // pointers into block memory, which never moves.
        let blocks = unsafe { &mut *self.blocks.get() };

        if let Some(block) = &blocks.current {
            let start = round_up(self.cur_block_pos.get(), align)?;
            if let Some(end) = start.checked_add(size) {
                if end <= block.size() {
                    self.cur_block_pos.set(end);
                    return Ok(block.offset(start));
                }
            }
        }

        // Obtain the replacement before retiring anything so a failed request
        // leaves the arena untouched.
        let next = self.take_block(&mut blocks.available, size)?;
        let ptr = next.ptr();
        if let Some(retired) = blocks.current.replace(next) {
            blocks.used.push(retired);
        }
        self.cur_block_pos.set(size);
        Ok(ptr)
    }

    fn take_block(&self, available: &mut Vec<Block>, size: usize) -> ArenaResult<Block> {
        if let Some(idx) = available.iter().rposition(|b| b.size() >= size) {
            return Ok(available.swap_remove(idx));
        }
        let block_size = size.max(self.block_size);
        tracing::trace!(block_size, "arena allocating a fresh block");
        Block::new(block_size, BLOCK_ALIGN)
    }

    /// Move `value` into the arena. It will never be dropped.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> ArenaResult<&mut T> {
        let ptr = self.alloc_layout(mem::size_of::<T>(), mem::align_of::<T>())?.cast::<T>();
        unsafe {
            // Safe since the memory is fresh, aligned for T and exclusively ours
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill<T: Copy>(&self, len: usize, value: T) -> ArenaResult<&mut [T]> {
        let ptr = self.alloc_array::<T>(len)?;
        unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(value);
            }
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), len))
        }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> ArenaResult<&mut [T]> {
        let ptr = self.alloc_array::<T>(src.len())?;
        unsafe {
            ptr.as_ptr().copy_from_nonoverlapping(src.as_ptr(), src.len());
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
        }
    }

    fn alloc_array<T>(&self, len: usize) -> ArenaResult<NonNull<T>> {
        let bytes = mem::size_of::<T>()
            .checked_mul(len)
            .ok_or(ArenaError::LayoutOverflow { bytes: usize::MAX })?;
        Ok(self.alloc_layout(bytes, mem::align_of::<T>())?.cast::<T>())
    }

    /// Recycle every block. Memory is kept for the next round of allocations.
    pub fn free_all(&mut self) {
        self.cur_block_pos.set(0);
        let blocks = self.blocks.get_mut();
        while let Some(block) = blocks.used.pop() {
            blocks.available.push(block);
        }
    }

    /// Total number of blocks owned by the arena.
    pub fn block_count(&self) -> usize {
        let blocks = self.blocks();
        blocks.current.is_some() as usize + blocks.used.len() + blocks.available.len()
    }

    pub fn used_block_count(&self) -> usize {
        self.blocks().used.len()
    }

    pub fn available_block_count(&self) -> usize {
        self.blocks().available.len()
    }

    /// Bytes held from the system allocator, whether in use or not.
    pub fn bytes_reserved(&self) -> usize {
        let blocks = self.blocks();
        blocks.current.iter()
            .chain(blocks.used.iter())
            .chain(blocks.available.iter())
            .map(|b| b.size())
            .sum()
    }

    /// Bytes handed out from the current block.
    pub fn current_block_pos(&self) -> usize {
        self.cur_block_pos.get()
    }

    fn blocks(&self) -> &Blocks {
        // Safe since `Blocks` is only mutated inside `alloc_layout`, which never
        // runs while this shared borrow is alive (the arena is not `Sync`).
        unsafe { &*self.blocks.get() }
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BLOCK_SIZE)
    }
}

impl Debug for MemoryArena {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArena")
            .field("block_size", &self.block_size)
            .field("cur_block_pos", &self.cur_block_pos.get())
            .field("used_blocks", &self.used_block_count())
            .field("available_blocks", &self.available_block_count())
            .finish()
    }
}
