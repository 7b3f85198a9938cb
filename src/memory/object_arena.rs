use std::cell::{Cell, UnsafeCell};
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

use crate::error::{ArenaError, ArenaResult};
use crate::memory::Block;

/// Target size in bytes of a single slab.
const SLAB_BYTES: usize = 65536;
const MIN_SLAB_LEN: usize = 16;

/// Typed slab allocator.
///
/// Hands out uninitialized slots for `T` from slabs of
/// `max(16, 65536 / size_of::<T>())` elements. Slots are never reused while the
/// arena is live and the arena never constructs or drops a `T`; the caller owns
/// initialization and any destruction that matters before [`ObjectArena::free_all`].
pub struct ObjectArena<T> {
    mem: Cell<Option<NonNull<MaybeUninit<T>>>>,
    n_available: Cell<usize>,
    slabs: UnsafeCell<Vec<Block>>,
}

unsafe impl<T: Send> Send for ObjectArena<T> {}

impl<T> ObjectArena<T> {
    pub fn new() -> Self {
        Self {
            mem: Cell::new(None),
            n_available: Cell::new(0),
            slabs: UnsafeCell::new(Vec::new()),
        }
    }

    /// Number of elements in every slab for this `T`.
    pub fn slab_len() -> usize {
        (SLAB_BYTES / mem::size_of::<T>().max(1)).max(MIN_SLAB_LEN)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self) -> ArenaResult<&mut MaybeUninit<T>> {
        let slot = match self.mem.get() {
            Some(slot) if self.n_available.get() > 0 => slot,
            _ => self.new_slab()?,
        };

        self.n_available.set(self.n_available.get() - 1);
        // Safe since at most one past the end of the current slab
        self.mem.set(Some(unsafe { NonNull::new_unchecked(slot.as_ptr().add(1)) }));

        // Safe since each slot is handed out exactly once
        Ok(unsafe { &mut *slot.as_ptr() })
    }

    /// Allocate a slot and move `value` into it. It will never be dropped by the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_with(&self, value: T) -> ArenaResult<&mut T> {
        let slot = self.alloc()?;
        Ok(slot.write(value))
    }

    fn new_slab(&self) -> ArenaResult<NonNull<MaybeUninit<T>>> {
        let n_alloc = Self::slab_len();
        let bytes = mem::size_of::<T>()
            .checked_mul(n_alloc)
            .ok_or(ArenaError::LayoutOverflow { bytes: usize::MAX })?;
        let slab = Block::new(bytes, mem::align_of::<T>())?;
        let first = slab.ptr().cast::<MaybeUninit<T>>();

        // Safe since the slab list is only touched here and in `&mut self` methods
        unsafe { (*self.slabs.get()).push(slab) };
        self.n_available.set(n_alloc);
        Ok(first)
    }

    /// Release every slab back to the system allocator.
    pub fn free_all(&mut self) {
        self.slabs.get_mut().clear();
        self.n_available.set(0);
        self.mem.set(None);
    }

    pub fn slab_count(&self) -> usize {
        unsafe { (*self.slabs.get()).len() }
    }

    /// Slots left in the current slab before the next one is allocated.
    pub fn available(&self) -> usize {
        self.n_available.get()
    }
}

impl<T> Default for ObjectArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_len() {
        assert_eq!(ObjectArena::<u8>::slab_len(), 65536);
        assert_eq!(ObjectArena::<[u8; 8192]>::slab_len(), 16);
        assert_eq!(ObjectArena::<[u8; 100_000]>::slab_len(), 16);
        assert_eq!(ObjectArena::<[f64; 4]>::slab_len(), 2048);
        assert_eq!(ObjectArena::<()>::slab_len(), 65536);
    }

    #[test]
    fn test_slots_are_distinct_and_contiguous() {
        let arena = ObjectArena::<u64>::new();
        let a = arena.alloc_with(1).unwrap() as *mut u64;
        let b = arena.alloc_with(2).unwrap() as *mut u64;
        assert_eq!(b as usize - a as usize, 8);
        unsafe {
            assert_eq!(*a, 1);
            assert_eq!(*b, 2);
        }
    }

    #[test]
    fn test_second_slab_after_capacity() {
        type Big = [u8; 8192];
        let arena = ObjectArena::<Big>::new();
        let n = ObjectArena::<Big>::slab_len();

        for _ in 0..n {
            arena.alloc().unwrap();
        }
        assert_eq!(arena.slab_count(), 1);
        assert_eq!(arena.available(), 0);

        arena.alloc().unwrap();
        assert_eq!(arena.slab_count(), 2);
        assert_eq!(arena.available(), n - 1);
    }

    #[test]
    fn test_free_all_releases() {
        let mut arena = ObjectArena::<[u32; 64]>::new();
        for _ in 0..300 {
            arena.alloc().unwrap();
        }
        assert_eq!(arena.slab_count(), 2);

        arena.free_all();
        assert_eq!(arena.slab_count(), 0);
        assert_eq!(arena.available(), 0);

        arena.alloc_with([7; 64]).unwrap();
        assert_eq!(arena.slab_count(), 1);
    }

    #[test]
    fn test_values_not_dropped() {
        use std::rc::Rc;
        let counter = Rc::new(());
        {
            let mut arena = ObjectArena::<Rc<()>>::new();
            arena.alloc_with(counter.clone()).unwrap();
            arena.free_all();
        }
        // The clone leaked along with the arena slot
        assert_eq!(Rc::strong_count(&counter), 2);
    }
}
