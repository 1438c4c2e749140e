use pool_js::BlockHeap;
use pool_js::PoolAllocator;
use pool_js::POOL_CHUNKS_COUNT;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum PoolOp {
  Alloc,
  Free(usize),
  Compact,
}

fn arb_ops() -> impl Strategy<Value = Vec<PoolOp>> {
  prop::collection::vec(
    prop_oneof![
      4 => Just(PoolOp::Alloc),
      4 => any::<usize>().prop_map(PoolOp::Free),
      1 => Just(PoolOp::Compact),
    ],
    0..256,
  )
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(128))]

  /// Balanced alloc/free sequences leave the recorded free count equal to the
  /// chunk capacity of the resident pools, and compaction then empties it.
  #[test]
  fn balanced_sequences_account_for_every_chunk(ops in arb_ops()) {
    let mut pools = PoolAllocator::new(BlockHeap::new(None));
    let mut live = Vec::new();
    for op in ops {
      match op {
        PoolOp::Alloc => live.push(pools.alloc().unwrap()),
        PoolOp::Free(i) if !live.is_empty() => {
          let chunk = live.swap_remove(i % live.len());
          pools.free(chunk);
        }
        PoolOp::Free(_) => {}
        PoolOp::Compact => pools.compact(),
      }
    }
    for chunk in live.drain(..) {
      pools.free(chunk);
    }
    prop_assert_eq!(
      pools.free_chunks(),
      pools.heap().live_blocks() * POOL_CHUNKS_COUNT
    );
    pools.compact();
    prop_assert_eq!(pools.free_chunks(), 0);
    prop_assert_eq!(pools.heap().live_blocks(), 0);
  }

  /// After compact, no pool is entirely free: every resident pool retains at
  /// least one allocated chunk, and a second compact changes nothing.
  #[test]
  fn compact_leaves_no_empty_pool(ops in arb_ops()) {
    let mut pools = PoolAllocator::new(BlockHeap::new(None));
    let mut live = Vec::new();
    for op in ops {
      match op {
        PoolOp::Alloc => live.push(pools.alloc().unwrap()),
        PoolOp::Free(i) if !live.is_empty() => {
          let chunk = live.swap_remove(i % live.len());
          pools.free(chunk);
        }
        PoolOp::Free(_) => {}
        PoolOp::Compact => pools.compact(),
      }
    }
    pools.compact();
    let blocks = pools.heap().live_blocks();
    if blocks > 0 {
      prop_assert!(pools.free_chunks() <= (POOL_CHUNKS_COUNT - 1) * blocks);
      prop_assert!(live.len() >= blocks);
    } else {
      prop_assert_eq!(pools.free_chunks(), 0);
    }
    let free = pools.free_chunks();
    pools.compact();
    prop_assert_eq!(pools.heap().live_blocks(), blocks);
    prop_assert_eq!(pools.free_chunks(), free);
  }

  /// The resident pool count never exceeds what the peak number of live
  /// chunks requires: pools are only acquired when the free list is empty.
  #[test]
  fn resident_pools_bounded_by_peak_live(ops in arb_ops()) {
    let mut pools = PoolAllocator::new(BlockHeap::new(None));
    let mut live = Vec::new();
    let mut peak = 0usize;
    for op in ops {
      match op {
        PoolOp::Alloc => {
          live.push(pools.alloc().unwrap());
          peak = peak.max(live.len());
        }
        PoolOp::Free(i) if !live.is_empty() => {
          let chunk = live.swap_remove(i % live.len());
          pools.free(chunk);
        }
        PoolOp::Free(_) => {}
        PoolOp::Compact => pools.compact(),
      }
      let bound = peak.div_ceil(POOL_CHUNKS_COUNT) + 1;
      prop_assert!(pools.heap().live_blocks() <= bound);
    }
  }
}
