//! Purge passes
//! 清理流程

use coarsetime::Instant;

use crate::{Budget, Error, Gpu, OnFree, ResId, ResourceCache, Result};

impl<R: Gpu, F: OnFree<R>> ResourceCache<R, F> {
  /// Drain the mailbox and return queue, then purge LRU while over budget
  /// 处理信箱与归还队列，然后在超预算时按 LRU 清理
  pub fn purge_as_needed(&mut self) {
    let _g = self.owner.enter();
    for msg in self.inbox.poll() {
      if msg.in_ts_cache {
        if let Some(s) = &self.secondary {
          s.remove(&msg.key);
        }
        continue;
      }
      if let Some(&id) = self.unique_map.get(&msg.key) {
        self.drop_unique(id);
      }
    }
    self.process_returned();

    let mut n = self.purge_lru_while_over();
    if self.over_budget()
      && let Some(s) = self.secondary.clone()
    {
      s.drop_unique_refs(Some(&mut *self));
      self.process_returned();
      n += self.purge_lru_while_over();
    }
    if n > 0 {
      log::debug!(
        "cache {}: purged {n}, budgeted {}/{}",
        self.id,
        self.budgeted_bytes,
        self.max_bytes
      );
    }
    self.validate_sampled();
  }

  fn purge_lru_while_over(&mut self) -> usize {
    let mut n = 0;
    while self.over_budget() {
      let Some(id) = self.pq.peek() else {
        break;
      };
      self.destroy(id);
      n += 1;
    }
    n
  }

  /// Purge idle resources regardless of budget
  /// 忽略预算清理空闲资源
  ///
  /// `older_than`: only those idle since before the cutoff.
  /// `scratch_only`: spare resources holding a unique key.
  /// `older_than`：仅清理在截止时间前已空闲的资源。
  /// `scratch_only`：保留持有唯一键的资源。
  pub fn purge_unlocked(&mut self, older_than: Option<Instant>, scratch_only: bool) -> usize {
    let _g = self.owner.enter();
    if !scratch_only && let Some(s) = self.secondary.clone() {
      match older_than {
        Some(t) => s.drop_unique_refs_older_than(t),
        None => s.drop_unique_refs(None),
      }
    }
    self.process_returned();

    let mut li: Vec<ResId> = Vec::new();
    for id in self.pq.sorted(&self.arena) {
      let e = &self.arena[id];
      if older_than.is_some_and(|t| e.since >= t) {
        break;
      }
      if !scratch_only || !e.unique.is_valid() {
        li.push(id);
      }
    }
    let n = li.len();
    for id in li {
      self.destroy(id);
    }
    log::debug!("cache {}: purge_unlocked freed {n}", self.id);
    self.validate_sampled();
    n
  }

  #[inline]
  pub fn purge_all_unlocked(&mut self) -> usize {
    self.purge_unlocked(None, false)
  }

  /// Make `bytes` of budget free, purging oldest first; all or nothing
  /// 腾出 `bytes` 预算，按从旧到新清理；要么全部完成，要么不动
  pub fn purge_to_headroom(&mut self, bytes: usize) -> Result<()> {
    let _g = self.owner.enter();
    if bytes > self.max_bytes {
      return Err(Error::HeadroomTooLarge {
        want: bytes,
        max: self.max_bytes,
      });
    }
    self.process_returned();
    if self.would_fit(bytes) {
      return Ok(());
    }

    let sorted = self.pq.sorted(&self.arena);
    let mut projected = self.budgeted_bytes;
    let mut cnt = 0;
    for (i, id) in sorted.iter().enumerate() {
      let e = &self.arena[*id];
      if e.budget == Budget::Budgeted {
        projected -= e.size;
      }
      if projected + bytes <= self.max_bytes {
        cnt = i + 1;
        break;
      }
    }
    if cnt == 0 {
      return Err(Error::NotEnoughPurgeable {
        want: bytes,
        avail: self.max_bytes.saturating_sub(projected),
      });
    }
    for id in &sorted[..cnt] {
      self.destroy(*id);
    }
    self.validate_sampled();
    Ok(())
  }

  /// Free at least `bytes` of budgeted memory from idle resources
  /// 从空闲资源中释放至少 `bytes` 字节的预算内内存
  ///
  /// With `prefer_scratch`, resources without a unique key go first.
  /// 设置 `prefer_scratch` 时，先清理无唯一键的资源。
  pub fn purge_bytes(&mut self, bytes: usize, prefer_scratch: bool) {
    let _g = self.owner.enter();
    self.process_returned();
    let target = self.budgeted_bytes.saturating_sub(bytes);

    if prefer_scratch && bytes < self.purgeable_bytes {
      for id in self.pq.sorted(&self.arena) {
        if target >= self.budgeted_bytes {
          break;
        }
        if !self.arena[id].unique.is_valid() {
          self.destroy(id);
        }
      }
    }

    if target < self.budgeted_bytes {
      let max = self.max_bytes;
      self.max_bytes = target;
      self.purge_as_needed();
      self.max_bytes = max;
    }
  }

  /// Destroy every resource, referenced or not, and empty the secondary cache
  /// 销毁全部资源（无论是否被引用）并清空二级缓存
  pub fn release_all(&mut self) {
    let _g = self.owner.enter();
    if let Some(s) = self.secondary.clone() {
      s.drop_all_refs();
    }
    self.process_returned();

    while let Some(&id) = self.non_purgeable.last() {
      self.destroy(id);
    }
    while let Some(id) = self.pq.peek() {
      self.destroy(id);
    }
    debug_assert!(self.arena.is_empty());
    debug_assert!(self.scratch_map.is_empty() && self.unique_map.is_empty());
    self.ts = 0;
    log::debug!("cache {}: released all", self.id);
  }
}
