use crate::heap::BlockHeap;
use crate::heap::BlockId;
use crate::heap::POOL_CHUNKS_COUNT;
use crate::heap::POOL_CHUNK_SIZE;
use crate::stats::PoolStats;
use crate::PoolError;

/// In-chunk null link. Chunk references are compressed to 16 bits, and the
/// all-ones pattern never denotes a real chunk.
const NIL: u16 = u16::MAX;

/// Heuristic marker written into a candidate pool's first chunk during
/// compaction. A match is only a hint; pass 2 confirms it by walking the
/// candidate bucket.
const COMPACT_MAGIC: u16 = 0x7e89;

/// Number of round-robin candidate buckets used by the compaction pass. Keeps
/// the pass-2 confirmation walk short.
const COMPACT_BUCKETS: usize = 8;

// Byte offsets of the temporary candidate header overwriting a pool's first
// chunk during compaction. The header must fit in one chunk.
const HDR_NEXT_CANDIDATE: usize = 0;
const HDR_LOCAL_CHAIN: usize = 2;
const HDR_MAGIC: usize = 4;
const HDR_FREE_COUNT: usize = 6;
const HDR_BUCKET: usize = 7;

/// Compressed reference to one chunk: `block * POOL_CHUNKS_COUNT + index`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ChunkRef(pub(crate) u16);

impl ChunkRef {
  /// The block-start query: which block owns this chunk.
  pub(crate) fn block(self) -> BlockId {
    BlockId(self.0 / POOL_CHUNKS_COUNT as u16)
  }

  pub(crate) fn byte_offset(self) -> usize {
    (self.0 as usize % POOL_CHUNKS_COUNT) * POOL_CHUNK_SIZE
  }

  fn first_of_block(block: BlockId) -> ChunkRef {
    ChunkRef(block.0 * POOL_CHUNKS_COUNT as u16)
  }

  fn is_first_of_block(self) -> bool {
    self.0 % POOL_CHUNKS_COUNT as u16 == 0
  }
}

/// Two-layer chunk allocator: fixed-size chunks carved out of heap blocks
/// ("pools"), with a process-wide free list threaded through the free chunks
/// themselves.
///
/// The free list head and the free-chunk count are the allocator's only
/// persistent state; pools carry no occupancy header. Fully-free pools are
/// rediscovered and released by [`PoolAllocator::compact`].
pub struct PoolAllocator {
  heap: BlockHeap,
  free_head: u16,
  free_count: usize,
  stats: PoolStats,
}

impl PoolAllocator {
  pub fn new(heap: BlockHeap) -> PoolAllocator {
    PoolAllocator {
      heap,
      free_head: NIL,
      free_count: 0,
      stats: PoolStats::default(),
    }
  }

  pub fn stats(&self) -> &PoolStats {
    &self.stats
  }

  pub fn free_chunks(&self) -> usize {
    self.free_count
  }

  pub fn heap(&self) -> &BlockHeap {
    &self.heap
  }

  pub fn heap_mut(&mut self) -> &mut BlockHeap {
    &mut self.heap
  }

  /// Allocates one chunk. Fails only if the free list is empty and the heap
  /// cannot provide a new pool.
  pub fn alloc(&mut self) -> Result<ChunkRef, PoolError> {
    if self.free_head == NIL {
      self.alloc_longpath()?;
    }
    debug_assert!(self.free_head != NIL && self.free_count != 0);

    let chunk = ChunkRef(self.free_head);
    self.free_head = self.load_u16(chunk, 0);
    self.free_count -= 1;
    self.stats.on_alloc_chunk();
    self.check_free_list();
    Ok(chunk)
  }

  /// Returns a chunk to the free list. O(1), never fails.
  pub fn free(&mut self, chunk: ChunkRef) {
    self.store_u16(chunk, 0, self.free_head);
    self.free_head = chunk.0;
    self.free_count += 1;
    self.stats.on_free_chunk();
    self.check_free_list();
  }

  /// Opaque payload access for an allocated chunk.
  pub fn chunk(&self, chunk: ChunkRef) -> &[u8; POOL_CHUNK_SIZE] {
    let block = self.heap.block(chunk.block());
    block[chunk.byte_offset()..chunk.byte_offset() + POOL_CHUNK_SIZE]
      .try_into()
      .unwrap()
  }

  pub fn chunk_mut(&mut self, chunk: ChunkRef) -> &mut [u8; POOL_CHUNK_SIZE] {
    let offset = chunk.byte_offset();
    let block = self.heap.block_mut(chunk.block());
    (&mut block[offset..offset + POOL_CHUNK_SIZE]).try_into().unwrap()
  }

  /// Slow path: the free list is empty, so request one pool from the heap.
  ///
  /// Heap growth may run the engine's GC, and the GC may free chunks; when
  /// that happens the fresh pool is redundant and is returned to the heap
  /// immediately, leaving the reclaimed chunks to satisfy the allocation.
  fn alloc_longpath(&mut self) -> Result<(), PoolError> {
    debug_assert_eq!(self.free_head, NIL);
    debug_assert_eq!(self.free_count, 0);

    let (block, reclaimed) = self.heap.alloc_block()?;
    for chunk in reclaimed {
      self.free(chunk);
    }
    if self.free_count != 0 {
      self.heap.free_block(block);
      return Ok(());
    }

    let first = ChunkRef::first_of_block(block);
    for i in 0..POOL_CHUNKS_COUNT as u16 {
      let chunk = ChunkRef(first.0 + i);
      let next = if i as usize + 1 == POOL_CHUNKS_COUNT {
        NIL
      } else {
        chunk.0 + 1
      };
      self.store_u16(chunk, 0, next);
    }
    self.free_head = first.0;
    self.free_count = POOL_CHUNKS_COUNT;
    self.stats.on_alloc_pool();
    tracing::trace!(block = block.0, "pool allocated");
    self.check_free_list();
    Ok(())
  }

  /// Releases every pool whose chunks are all free.
  ///
  /// The pool has no occupancy counter, so the occupancy is rediscovered in
  /// three passes over the free list:
  ///
  /// 1. Chunks that are first in their pool become compaction candidates:
  ///    they are unlinked and overwritten with a temporary header holding a
  ///    magic marker, a free count and a local chain, then filed into one of
  ///    [`COMPACT_BUCKETS`] round-robin buckets.
  /// 2. Every remaining free chunk inspects its pool's first chunk. If that
  ///    chunk carries the magic and is confirmed (by a linear bucket walk) to
  ///    be a candidate, the chunk moves from the global free list to the
  ///    candidate's local chain and the candidate's free count grows.
  /// 3. Candidates with a full count are returned to the heap; all others
  ///    relink their local chain (the first chunk included) back into the
  ///    global free list.
  ///
  /// Calling this is never required for correctness of `alloc`/`free`, and
  /// the pass is idempotent.
  pub fn compact(&mut self) {
    let mut bucket_heads = [NIL; COMPACT_BUCKETS];
    let mut candidates: u32 = 0;

    // Pass 1: collect pools whose first chunk is free.
    let mut prev = NIL;
    let mut iter = self.free_head;
    while iter != NIL {
      let chunk = ChunkRef(iter);
      let next = self.load_u16(chunk, 0);
      if chunk.is_first_of_block() {
        self.unlink_after(prev, next);
        let bucket = candidates as usize % COMPACT_BUCKETS;
        candidates += 1;
        self.store_u16(chunk, HDR_NEXT_CANDIDATE, bucket_heads[bucket]);
        self.store_u16(chunk, HDR_LOCAL_CHAIN, NIL);
        self.store_u16(chunk, HDR_MAGIC, COMPACT_MAGIC);
        // The first chunk itself counts as free.
        self.store_u8(chunk, HDR_FREE_COUNT, 1);
        self.store_u8(chunk, HDR_BUCKET, bucket as u8);
        bucket_heads[bucket] = chunk.0;
      } else {
        prev = iter;
      }
      iter = next;
    }

    if candidates == 0 {
      return;
    }

    // Pass 2: attribute the remaining free chunks to candidate pools.
    let mut prev = NIL;
    let mut iter = self.free_head;
    while iter != NIL {
      let chunk = ChunkRef(iter);
      let next = self.load_u16(chunk, 0);
      let first = ChunkRef::first_of_block(chunk.block());

      let mut moved_to_local_chain = false;
      if self.load_u16(first, HDR_MAGIC) == COMPACT_MAGIC {
        let bucket = self.load_u8(first, HDR_BUCKET) as usize;
        if bucket < COMPACT_BUCKETS {
          // The magic is only a heuristic gate; confirm by walking the
          // bucket before trusting the header.
          let mut cand = bucket_heads[bucket];
          while cand != NIL {
            if cand == first.0 {
              let count = self.load_u8(first, HDR_FREE_COUNT);
              self.store_u8(first, HDR_FREE_COUNT, count + 1);
              self.unlink_after(prev, next);
              let local = self.load_u16(first, HDR_LOCAL_CHAIN);
              self.store_u16(chunk, 0, local);
              self.store_u16(first, HDR_LOCAL_CHAIN, chunk.0);
              moved_to_local_chain = true;
              break;
            }
            cand = self.load_u16(ChunkRef(cand), HDR_NEXT_CANDIDATE);
          }
        }
      }
      if !moved_to_local_chain {
        prev = iter;
      }
      iter = next;
    }

    // Pass 3: release full pools, relink the rest.
    for bucket in 0..COMPACT_BUCKETS {
      let mut iter = bucket_heads[bucket];
      while iter != NIL {
        let first = ChunkRef(iter);
        let next_candidate = self.load_u16(first, HDR_NEXT_CANDIDATE);

        if self.load_u8(first, HDR_FREE_COUNT) as usize == POOL_CHUNKS_COUNT {
          self.free_count -= POOL_CHUNKS_COUNT;
          self.heap.free_block(first.block());
          self.stats.on_free_pool();
          tracing::trace!(block = first.block().0, "pool released");
        } else {
          let local = self.load_u16(first, HDR_LOCAL_CHAIN);
          self.store_u16(first, 0, local);
          let mut tail = first.0;
          loop {
            let next = self.load_u16(ChunkRef(tail), 0);
            if next == NIL {
              break;
            }
            tail = next;
          }
          self.store_u16(ChunkRef(tail), 0, self.free_head);
          self.free_head = first.0;
        }

        iter = next_candidate;
      }
    }

    self.check_free_list();
  }

  /// Engine-lifetime teardown. Every chunk must have been freed by now, so
  /// compaction returns every pool to the heap.
  pub fn finalize(mut self) {
    self.compact();
    debug_assert_eq!(self.free_count, 0, "pool chunks leaked at finalize");
  }

  fn unlink_after(&mut self, prev: u16, next: u16) {
    if prev == NIL {
      self.free_head = next;
    } else {
      self.store_u16(ChunkRef(prev), 0, next);
    }
  }

  fn load_u16(&self, chunk: ChunkRef, offset: usize) -> u16 {
    let bytes = self.chunk(chunk);
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
  }

  fn store_u16(&mut self, chunk: ChunkRef, offset: usize, value: u16) {
    let bytes = self.chunk_mut(chunk);
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
  }

  fn load_u8(&self, chunk: ChunkRef, offset: usize) -> u8 {
    self.chunk(chunk)[offset]
  }

  fn store_u8(&mut self, chunk: ChunkRef, offset: usize, value: u8) {
    self.chunk_mut(chunk)[offset] = value;
  }

  /// Walking the free list must meet exactly `free_count` distinct chunks.
  #[cfg(debug_assertions)]
  fn check_free_list(&self) {
    let mut seen = std::collections::HashSet::new();
    let mut iter = self.free_head;
    while iter != NIL {
      assert!(seen.insert(iter), "free list contains a cycle or duplicate");
      iter = self.load_u16(ChunkRef(iter), 0);
    }
    assert_eq!(seen.len(), self.free_count);
  }

  #[cfg(not(debug_assertions))]
  fn check_free_list(&self) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  fn allocator() -> PoolAllocator {
    PoolAllocator::new(BlockHeap::new(None))
  }

  #[test]
  fn alloc_formats_a_pool_on_demand() {
    let mut pools = allocator();
    let chunk = pools.alloc().unwrap();
    assert_eq!(pools.free_chunks(), POOL_CHUNKS_COUNT - 1);
    assert_eq!(pools.heap().live_blocks(), 1);
    pools.free(chunk);
    assert_eq!(pools.free_chunks(), POOL_CHUNKS_COUNT);
  }

  #[test]
  fn payload_survives_until_free() {
    let mut pools = allocator();
    let a = pools.alloc().unwrap();
    let b = pools.alloc().unwrap();
    pools.chunk_mut(a).copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    pools.chunk_mut(b).copy_from_slice(&[9; POOL_CHUNK_SIZE]);
    assert_eq!(pools.chunk(a), &[1, 2, 3, 4, 5, 6, 7, 8]);
    pools.free(b);
    assert_eq!(pools.chunk(a), &[1, 2, 3, 4, 5, 6, 7, 8]);
  }

  #[test]
  fn compact_keeps_partial_pools() {
    let mut pools = allocator();
    let keep = pools.alloc().unwrap();
    let gone: Vec<_> = (1..POOL_CHUNKS_COUNT).map(|_| pools.alloc().unwrap()).collect();
    for chunk in gone {
      pools.free(chunk);
    }
    pools.compact();
    assert_eq!(pools.heap().live_blocks(), 1);
    assert_eq!(pools.free_chunks(), POOL_CHUNKS_COUNT - 1);
    pools.free(keep);
    pools.compact();
    assert_eq!(pools.heap().live_blocks(), 0);
    assert_eq!(pools.free_chunks(), 0);
  }

  #[test]
  fn out_of_memory_is_reported() {
    let mut pools = PoolAllocator::new(BlockHeap::new(Some(1)));
    for _ in 0..POOL_CHUNKS_COUNT {
      pools.alloc().unwrap();
    }
    assert!(matches!(pools.alloc(), Err(crate::PoolError::OutOfMemory)));
  }
}
