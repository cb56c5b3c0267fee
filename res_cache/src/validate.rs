//! Consistency check of every index and total
//! 所有索引与统计量的一致性检查

use crate::{Budget, Gpu, OnFree, ResourceCache, entry::Loc};

// Caches this small are checked on every pass in debug builds
// 调试构建中，此规模以下的缓存每次都检查
const ALWAYS_BELOW: usize = 64;

// Otherwise one pass in this many
// 否则每这么多次检查一次
const SAMPLE: u32 = 16;

impl<R: Gpu, F: OnFree<R>> ResourceCache<R, F> {
  #[inline]
  pub(crate) fn validate_sampled(&self) {
    if cfg!(debug_assertions) && (self.arena.len() < ALWAYS_BELOW || fastrand::u32(..SAMPLE) == 0)
    {
      self.validate();
    }
  }

  /// Panic if any index or running total is inconsistent
  /// 索引或统计量不一致时 panic
  pub fn validate(&self) {
    let (mut bytes, mut budgeted_bytes, mut budgeted_count) = (0, 0, 0);
    let (mut purgeable_bytes, mut ucb_bytes) = (0, 0);
    let (mut in_scratch, mut with_unique) = (0, 0);

    for (id, e) in self.arena.iter() {
      bytes += e.size;
      match e.budget {
        Budget::Budgeted => {
          budgeted_bytes += e.size;
          budgeted_count += 1;
        }
        Budget::UnbudgetedCacheable => ucb_bytes += e.size,
        Budget::UnbudgetedUncacheable => {}
      }

      match e.loc {
        Loc::NonPurgeable(pos) => {
          assert_eq!(self.non_purgeable.get(pos as usize), Some(&id), "{id:?} loc");
          assert!(!e.purgeable(), "{id:?} idle but not in purgeable queue");
        }
        Loc::Purgeable(pos) => {
          assert_eq!(self.pq.heap.get(pos as usize), Some(&id), "{id:?} loc");
          assert!(e.purgeable(), "{id:?} referenced but purgeable");
          purgeable_bytes += e.size;
        }
      }

      assert_eq!(e.in_scratch, e.usable_as_scratch(), "{id:?} scratch membership");
      if e.in_scratch {
        in_scratch += 1;
        let li = self.scratch_map.get(&e.scratch);
        assert!(li.is_some_and(|li| li.contains(&id)), "{id:?} missing in scratch map");
      }
      if e.unique.is_valid() {
        with_unique += 1;
        assert!(!e.in_scratch, "{id:?} unique and scratch");
        assert_eq!(self.unique_map.get(&e.unique), Some(&id), "{id:?} unique map");
      }
    }

    assert_eq!(self.non_purgeable.len() + self.pq.len(), self.arena.len());
    assert_eq!(bytes, self.bytes, "bytes");
    assert_eq!(budgeted_bytes, self.budgeted_bytes, "budgeted bytes");
    assert_eq!(budgeted_count, self.budgeted_count, "budgeted count");
    assert_eq!(purgeable_bytes, self.purgeable_bytes, "purgeable bytes");
    assert_eq!(ucb_bytes, self.unbudgeted_cacheable_bytes, "unbudgeted cacheable bytes");
    assert_eq!(
      self.scratch_map.values().map(Vec::len).sum::<usize>(),
      in_scratch,
      "scratch map size"
    );
    assert_eq!(self.unique_map.len(), with_unique, "unique map size");

    // Heap order
    // 堆序
    let heap = &self.pq.heap;
    for pos in 1..heap.len() {
      let parent = (pos - 1) / 2;
      assert!(
        self.arena[heap[parent]].ts <= self.arena[heap[pos]].ts,
        "purgeable heap order at {pos}"
      );
    }
  }
}
