//! Last-use timestamps
//! 最近使用时间戳
//!
//! A 32-bit counter. When it wraps to 0, every live resource is renumbered
//! 0..N-1 in its existing order before the next stamp is handed out.
//! 32 位计数器。回绕到 0 时，先按现有顺序把所有存活资源重编号为 0..N-1，
//! 再分配下一个时间戳。

use crate::{Gpu, OnFree, ResId, ResourceCache, entry::Loc};

impl<R: Gpu, F: OnFree<R>> ResourceCache<R, F> {
  pub(crate) fn next_ts(&mut self) -> u32 {
    if self.ts == 0 && !self.arena.is_empty() {
      self.renumber();
    }
    let ts = self.ts;
    self.ts = self.ts.wrapping_add(1);
    ts
  }

  fn renumber(&mut self) {
    let purgeable = self.pq.sorted(&self.arena);
    let arena = &self.arena;
    self.non_purgeable.sort_by_key(|id| arena[*id].ts);

    let (np, pq) = (&self.non_purgeable, &purgeable);
    let mut merged: Vec<ResId> = Vec::with_capacity(np.len() + pq.len());
    let (mut i, mut j) = (0, 0);
    while i < pq.len() || j < np.len() {
      let take_pq = j == np.len() || (i < pq.len() && arena[pq[i]].ts < arena[np[j]].ts);
      if take_pq {
        merged.push(pq[i]);
        i += 1;
      } else {
        merged.push(np[j]);
        j += 1;
      }
    }

    for (ts, id) in merged.iter().enumerate() {
      self.arena[*id].ts = ts as u32;
    }
    for (pos, id) in self.non_purgeable.iter().enumerate() {
      self.arena[*id].loc = Loc::NonPurgeable(pos as u32);
    }
    // Ascending order already satisfies the heap property
    // 升序数组本身满足堆性质
    self.pq.reset_sorted(purgeable, &mut self.arena);

    self.ts = merged.len() as u32;
    log::debug!("cache {}: timestamp wrapped, renumbered {}", self.id, merged.len());
  }
}
