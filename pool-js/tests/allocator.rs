use pool_js::BlockHeap;
use pool_js::ChunkRef;
use pool_js::PoolAllocator;
use pool_js::PoolError;
use pool_js::POOL_CHUNKS_COUNT;
use std::cell::RefCell;
use std::rc::Rc;

fn allocator() -> PoolAllocator {
  PoolAllocator::new(BlockHeap::new(None))
}

#[test]
fn compaction_releases_two_full_pools() {
  let mut pools = allocator();
  let chunks: Vec<_> = (0..2 * POOL_CHUNKS_COUNT)
    .map(|_| pools.alloc().unwrap())
    .collect();
  assert_eq!(pools.heap().live_blocks(), 2);

  for chunk in chunks.into_iter().rev() {
    pools.free(chunk);
  }
  assert_eq!(pools.free_chunks(), 2 * POOL_CHUNKS_COUNT);

  pools.compact();
  assert_eq!(pools.free_chunks(), 0);
  assert_eq!(pools.heap().live_blocks(), 0);
}

#[test]
fn compaction_is_idempotent() {
  let mut pools = allocator();
  let chunks: Vec<_> = (0..3 * POOL_CHUNKS_COUNT)
    .map(|_| pools.alloc().unwrap())
    .collect();
  // Free an irregular subset so one pool empties and two stay partial.
  for (i, chunk) in chunks.iter().enumerate() {
    if i % 3 != 0 || i < POOL_CHUNKS_COUNT {
      pools.free(*chunk);
    }
  }

  pools.compact();
  let blocks = pools.heap().live_blocks();
  let free = pools.free_chunks();
  pools.compact();
  assert_eq!(pools.heap().live_blocks(), blocks);
  assert_eq!(pools.free_chunks(), free);
}

#[test]
fn alloc_free_pair_preserves_state() {
  let mut pools = allocator();
  let retained: Vec<_> = (0..5).map(|_| pools.alloc().unwrap()).collect();

  let free_before = pools.free_chunks();
  let blocks_before = pools.heap().live_blocks();
  let chunk = pools.alloc().unwrap();
  pools.free(chunk);
  assert_eq!(pools.free_chunks(), free_before);
  assert_eq!(pools.heap().live_blocks(), blocks_before);

  for chunk in retained {
    pools.free(chunk);
  }
}

#[test]
fn gc_reclaim_during_growth_discards_fresh_pool() {
  let reclaim: Rc<RefCell<Vec<ChunkRef>>> = Rc::new(RefCell::new(Vec::new()));
  let mut heap = BlockHeap::new(None);
  let hook_side = Rc::clone(&reclaim);
  heap.set_gc_hook(Box::new(move || hook_side.borrow_mut().drain(..).collect()));

  let mut pools = PoolAllocator::new(heap);
  let chunks: Vec<_> = (0..POOL_CHUNKS_COUNT)
    .map(|_| pools.alloc().unwrap())
    .collect();
  assert_eq!(pools.heap().live_blocks(), 1);
  assert_eq!(pools.free_chunks(), 0);

  // The engine decides to drop one of its objects when the next GC runs.
  reclaim.borrow_mut().push(chunks[0]);

  // The slow path must notice the reclaimed chunk and hand back the block it
  // just acquired instead of keeping both.
  let chunk = pools.alloc().unwrap();
  assert_eq!(chunk, chunks[0]);
  assert_eq!(pools.heap().live_blocks(), 1);
}

#[test]
fn heap_exhaustion_surfaces_out_of_memory() {
  let mut pools = PoolAllocator::new(BlockHeap::new(Some(2)));
  for _ in 0..2 * POOL_CHUNKS_COUNT {
    pools.alloc().unwrap();
  }
  assert_eq!(pools.alloc(), Err(PoolError::OutOfMemory));
  // Freeing is still possible after an allocation failure.
}

#[test]
fn stats_track_pools_and_chunks() {
  let mut pools = allocator();
  let chunks: Vec<_> = (0..POOL_CHUNKS_COUNT + 1)
    .map(|_| pools.alloc().unwrap())
    .collect();
  assert_eq!(pools.stats().pools_count, 2);
  assert_eq!(pools.stats().allocated_chunks, POOL_CHUNKS_COUNT + 1);
  assert_eq!(pools.stats().peak_allocated_chunks, POOL_CHUNKS_COUNT + 1);

  for chunk in chunks {
    pools.free(chunk);
  }
  pools.compact();
  assert_eq!(pools.stats().pools_count, 0);
  assert_eq!(pools.stats().allocated_chunks, 0);
  assert_eq!(pools.stats().peak_pools_count, 2);
}

#[test]
fn finalize_after_draining_everything() {
  let mut pools = allocator();
  let chunks: Vec<_> = (0..20).map(|_| pools.alloc().unwrap()).collect();
  for chunk in chunks {
    pools.free(chunk);
  }
  pools.finalize();
}
