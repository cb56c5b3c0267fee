//! Lock-guarded view cache
//! 锁保护的视图缓存

use std::{mem::size_of, sync::Arc};

use coarsetime::Instant;
use hashlink::LruCache;
use parking_lot::Mutex;
use res_key::UniqueKey;

use crate::{BudgetSource, Secondary};

struct Entry<V> {
  key: UniqueKey,
  view: Option<Arc<V>>,
  last: Instant,
}

struct Inner<V> {
  // Key -> slot, front is LRU
  // 键 -> 槽位，前端为最久未用
  map: LruCache<UniqueKey, u32>,
  entries: Vec<Entry<V>>,
  free: Vec<u32>,
  recycled: u64,
}

impl<V> Inner<V> {
  fn hit(&mut self, key: &UniqueKey) -> Option<&mut Entry<V>> {
    let idx = *self.map.get(key)? as usize;
    let e = &mut self.entries[idx];
    e.last = Instant::now();
    Some(e)
  }

  fn put(&mut self, key: UniqueKey, view: Arc<V>) {
    let entry = Entry {
      key: key.clone(),
      view: Some(view),
      last: Instant::now(),
    };
    let idx = match self.free.pop() {
      Some(idx) => {
        self.recycled += 1;
        self.entries[idx as usize] = entry;
        idx
      }
      None => {
        self.entries.push(entry);
        (self.entries.len() - 1) as u32
      }
    };
    self.map.insert(key, idx);
  }

  // Returns the view so it is dropped outside the lock
  // 返回视图，以便在锁外释放
  fn take(&mut self, key: &UniqueKey) -> Option<Arc<V>> {
    let idx = self.map.remove(key)?;
    self.free.push(idx);
    let e = &mut self.entries[idx as usize];
    e.key.reset();
    e.view.take()
  }

  // Slots from the LRU end, stopping at the first entry not older than `cutoff`
  // 从 LRU 端取槽位，遇到不早于 `cutoff` 的条目即停止
  fn lru_slots(&self, cutoff: Option<Instant>) -> Vec<(u32, Instant)> {
    self
      .map
      .iter()
      .map(|(_, &idx)| (idx, self.entries[idx as usize].last))
      .take_while(|(_, last)| cutoff.is_none_or(|t| *last < t))
      .collect()
  }

  // Take the slot's view if only the cache holds it and the slot was not
  // touched or reused since `last`
  // 仅缓存持有视图且槽位自 `last` 起未被访问或复用时取出视图
  fn take_unique(&mut self, idx: u32, last: Instant) -> Option<Arc<V>> {
    let e = self.entries.get_mut(idx as usize)?;
    if e.last != last || !e.view.as_ref().is_some_and(|v| Arc::strong_count(v) == 1) {
      return None;
    }
    let key = std::mem::take(&mut e.key);
    let view = e.view.take();
    self.map.remove(&key);
    self.free.push(idx);
    view
  }
}

/// Thread-safe cache of shared views
/// 线程安全的共享视图缓存
pub struct ThreadSafeCache<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> Default for ThreadSafeCache<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V> ThreadSafeCache<V> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        map: LruCache::new_unbounded(),
        entries: Vec::new(),
        free: Vec::new(),
        recycled: 0,
      }),
    }
  }

  /// Lookup, refreshing recency
  /// 查找并刷新使用时间
  pub fn find(&self, key: &UniqueKey) -> Option<Arc<V>> {
    self.inner.lock().hit(key).and_then(|e| e.view.clone())
  }

  /// Lookup returning the stored key's custom data too
  /// 查找并同时返回已存键的自定义数据
  pub fn find_with_data(&self, key: &UniqueKey) -> Option<(Arc<V>, Option<Arc<[u8]>>)> {
    let mut inner = self.inner.lock();
    let e = inner.hit(key)?;
    let view = e.view.clone()?;
    Some((view, e.key.custom_data().cloned()))
  }

  /// Insert unless present; the stored view always wins
  /// 不存在时插入；总是返回已存的视图
  pub fn add(&self, key: UniqueKey, view: Arc<V>) -> Arc<V> {
    self.add_with_data(key, view).0
  }

  pub fn add_with_data(&self, key: UniqueKey, view: Arc<V>) -> (Arc<V>, Option<Arc<[u8]>>) {
    self.add_with_data_if(key, view, |_, _| false)
  }

  /// Insert, or replace the stored entry when `is_newer_better(incumbent, challenger)`
  /// 插入；若 `is_newer_better(已存, 新来)` 为真则替换已存条目
  ///
  /// The closure sees both keys' custom data. The returned view and data are
  /// those left in the cache.
  /// 闭包接收双方键的自定义数据。返回缓存中留下的视图与数据。
  pub fn add_with_data_if(
    &self,
    key: UniqueKey,
    view: Arc<V>,
    is_newer_better: impl FnOnce(Option<&Arc<[u8]>>, Option<&Arc<[u8]>>) -> bool,
  ) -> (Arc<V>, Option<Arc<[u8]>>) {
    let data = key.custom_data().cloned();
    let mut inner = self.inner.lock();
    if let Some(e) = inner.hit(&key)
      && let Some(cur) = e.view.clone()
    {
      if !is_newer_better(e.key.custom_data(), data.as_ref()) {
        return (cur, e.key.custom_data().cloned());
      }
      e.view = Some(view.clone());
      e.key = key;
      drop(inner);
      drop(cur);
      return (view, data);
    }
    inner.put(key, view.clone());
    (view, data)
  }

  /// Lookup, else build outside the lock and race to publish
  /// 查找，未命中则在锁外构建并竞争发布
  pub fn find_or_add(&self, key: &UniqueKey, make: impl FnOnce() -> V) -> Arc<V> {
    if let Some(v) = self.find(key) {
      return v;
    }
    self.add(key.clone(), Arc::new(make()))
  }

  pub fn remove(&self, key: &UniqueKey) {
    let view = self.inner.lock().take(key);
    drop(view);
  }

  /// Walk from LRU end recycling entries held only here
  /// 从 LRU 端遍历，回收仅被缓存持有的条目
  ///
  /// With a budget source, it is asked before each entry and the walk stops
  /// as soon as it is no longer over budget. Each view is dropped outside the
  /// lock before the next question.
  /// 有预算来源时，每个条目前都会询问，一旦不再超预算即停止。
  /// 每个视图在下一次询问前于锁外释放。
  pub fn drop_unique_refs(&self, mut budget: Option<&mut dyn BudgetSource>) -> usize {
    let slots = self.inner.lock().lru_slots(None);
    let mut n = 0;
    for (idx, last) in slots {
      if let Some(src) = budget.as_deref_mut()
        && !src.over_budget()
      {
        break;
      }
      let view = self.inner.lock().take_unique(idx, last);
      if view.is_some() {
        n += 1;
      }
      drop(view);
    }
    if n > 0 {
      log::debug!("ts_cache: recycled {n} uniquely held views");
    }
    n
  }

  /// Same walk, stopping at the first entry not older than `cutoff`
  /// 同样的遍历，遇到不早于 `cutoff` 的条目即停止
  pub fn drop_unique_refs_older_than(&self, cutoff: Instant) -> usize {
    let dropped: Vec<Arc<V>> = {
      let mut inner = self.inner.lock();
      let slots = inner.lru_slots(Some(cutoff));
      slots
        .into_iter()
        .filter_map(|(idx, last)| inner.take_unique(idx, last))
        .collect()
    };
    dropped.len()
  }

  /// Empty the cache
  /// 清空缓存
  pub fn drop_all_refs(&self) {
    let views: Vec<Arc<V>> = {
      let mut inner = self.inner.lock();
      inner.map.clear();
      inner.free.clear();
      inner.entries.drain(..).filter_map(|e| e.view).collect()
    };
    drop(views);
  }

  pub fn len(&self) -> usize {
    self.inner.lock().map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().map.is_empty()
  }

  /// Bookkeeping bytes, excluding what views point at
  /// 簿记字节数，不含视图所指内容
  pub fn approx_bytes_used(&self) -> usize {
    let inner = self.inner.lock();
    inner.entries.capacity() * size_of::<Entry<V>>()
      + inner.free.capacity() * size_of::<u32>()
      + inner
        .entries
        .iter()
        .map(|e| e.key.size())
        .sum::<usize>()
      + inner.map.len() * (size_of::<UniqueKey>() + size_of::<u32>())
  }

  /// Number of adds that reused a recycled slot
  /// 复用回收槽位的 add 次数
  pub fn recycled(&self) -> u64 {
    self.inner.lock().recycled
  }
}

impl<V: Send + Sync> Secondary for ThreadSafeCache<V> {
  fn remove(&self, key: &UniqueKey) {
    ThreadSafeCache::remove(self, key);
  }

  fn drop_unique_refs(&self, budget: Option<&mut dyn BudgetSource>) {
    ThreadSafeCache::drop_unique_refs(self, budget);
  }

  fn drop_unique_refs_older_than(&self, cutoff: Instant) {
    ThreadSafeCache::drop_unique_refs_older_than(self, cutoff);
  }

  fn drop_all_refs(&self) {
    ThreadSafeCache::drop_all_refs(self);
  }
}
