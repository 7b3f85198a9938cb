use std::mem::MaybeUninit;

use rendercore::{MemoryArena, ObjectArena};

#[test]
fn oversized_block_is_recycled_after_free_all() -> anyhow::Result<()> {
    let mut arena = MemoryArena::default();
    arena.alloc_bytes(40_000)?;
    assert_eq!(arena.block_count(), 1);
    assert!(arena.bytes_reserved() >= 40_000);

    arena.free_all();
    arena.alloc_bytes(1000)?;
    assert_eq!(arena.block_count(), 1);
    Ok(())
}

#[test]
fn stable_cycles_do_not_grow() -> anyhow::Result<()> {
    let mut arena = MemoryArena::new(4096);
    let mut blocks_after_first = 0;
    for cycle in 0..50 {
        for _ in 0..200 {
            arena.alloc_bytes(64)?;
        }
        if cycle == 0 {
            blocks_after_first = arena.block_count();
            assert_eq!(blocks_after_first, 4);
        }
        assert_eq!(arena.block_count(), blocks_after_first, "cycle {}", cycle);
        arena.free_all();
    }
    Ok(())
}

#[test]
fn allocations_do_not_overlap() -> anyhow::Result<()> {
    let arena = MemoryArena::new(256);
    let mut values = Vec::new();
    for i in 0..100u64 {
        values.push(arena.alloc(i)?);
    }
    let block = arena.alloc_slice_fill(40, 7u32)?;
    for (i, v) in values.iter().enumerate() {
        assert_eq!(**v, i as u64);
    }
    assert!(block.iter().all(|&x| x == 7));
    Ok(())
}

#[test]
fn object_arena_slab_boundary() -> anyhow::Result<()> {
    let mut arena = ObjectArena::<[f64; 4]>::new();
    let k = ObjectArena::<[f64; 4]>::slab_len();
    assert_eq!(k, 65536 / 32);

    for _ in 0..k {
        arena.alloc()?;
    }
    assert_eq!(arena.slab_count(), 1);
    let slot: &mut MaybeUninit<[f64; 4]> = arena.alloc()?;
    *slot = MaybeUninit::new([1.0; 4]);
    assert_eq!(arena.slab_count(), 2);

    arena.free_all();
    assert_eq!(arena.slab_count(), 0);
    Ok(())
}

#[test]
fn per_worker_arenas() {
    use rayon::prelude::*;

    let sums: Vec<u64> = (0..64u64)
        .into_par_iter()
        .map_init(MemoryArena::default, |arena, n| {
            let total: u64 = match arena.alloc_slice_copy(&[n, n, n]) {
                Ok(s) => s.iter().sum(),
                Err(_) => 0,
            };
            arena.free_all();
            total
        })
        .collect();
    assert_eq!(sums[10], 30);
}
