//! Resource cache: registry, keys, references and budget policy
//! 资源缓存：注册表、键、引用与预算策略

use std::{
  sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
    mpsc::{Receiver, Sender, channel},
  },
};

use coarsetime::Instant;
use msg_bus::Inbox;
use res_key::{KeyMap, ScratchKey, UniqueKey};
use ts_cache::{BudgetSource, Secondary};

use crate::{
  Budget, Conf, Config, Gpu, NoFree, OnFree, RefKind, ResId, ResRef, Stats,
  arena::Arena,
  entry::{Entry, Loc},
  msg::{BUS, UniqueKeyInvalidated},
  owner::SingleOwner,
  pq::Pq,
};

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Budgeted cache of GPU resources, driven by a single owner thread
/// 带预算的 GPU 资源缓存，由单一拥有者线程驱动
pub struct ResourceCache<R, F = NoFree> {
  pub(crate) id: u32,
  pub(crate) owner: SingleOwner,
  pub(crate) arena: Arena<Entry<R>>,
  pub(crate) non_purgeable: Vec<ResId>,
  pub(crate) pq: Pq,
  pub(crate) scratch_map: KeyMap<ScratchKey, Vec<ResId>>,
  pub(crate) unique_map: KeyMap<UniqueKey, ResId>,
  pub(crate) ts: u32,
  pub(crate) bytes: usize,
  pub(crate) budgeted_bytes: usize,
  pub(crate) budgeted_count: usize,
  pub(crate) purgeable_bytes: usize,
  pub(crate) unbudgeted_cacheable_bytes: usize,
  pub(crate) high_count: usize,
  pub(crate) high_bytes: usize,
  pub(crate) max_bytes: usize,
  pub(crate) inbox: Inbox<UniqueKeyInvalidated>,
  pub(crate) ret_tx: Sender<ResId>,
  pub(crate) ret_rx: Receiver<ResId>,
  pub(crate) secondary: Option<Arc<dyn Secondary>>,
  pub(crate) on_free: F,
}

impl<R: Gpu> ResourceCache<R> {
  pub fn new(conf: &[Conf]) -> Self {
    Self::with_on_free(conf, NoFree)
  }
}

impl<R: Gpu, F: OnFree<R>> ResourceCache<R, F> {
  pub fn with_on_free(conf: &[Conf], on_free: F) -> Self {
    let config = Config::from(conf);
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let (ret_tx, ret_rx) = channel();
    Self {
      id,
      owner: SingleOwner::default(),
      arena: Arena::new(),
      non_purgeable: Vec::new(),
      pq: Pq::new(),
      scratch_map: KeyMap::default(),
      unique_map: KeyMap::default(),
      ts: 0,
      bytes: 0,
      budgeted_bytes: 0,
      budgeted_count: 0,
      purgeable_bytes: 0,
      unbudgeted_cacheable_bytes: 0,
      high_count: 0,
      high_bytes: 0,
      max_bytes: config.max_bytes,
      inbox: BUS.inbox(id),
      ret_tx,
      ret_rx,
      secondary: None,
      on_free,
    }
  }

  /// Id that invalidation messages are routed by
  /// 失效消息的路由 id
  #[inline]
  pub fn id(&self) -> u32 {
    self.id
  }

  /// Attach a secondary cache trimmed alongside this one
  /// 挂接随本缓存一同清理的二级缓存
  pub fn set_secondary(&mut self, secondary: Arc<dyn Secondary>) {
    self.secondary = Some(secondary);
  }

  #[inline]
  pub fn secondary(&self) -> Option<&Arc<dyn Secondary>> {
    self.secondary.as_ref()
  }

  /// Register a new resource, returned with one usage reference
  /// 注册新资源，返回时带一个使用引用
  pub fn insert(&mut self, res: R, budget: Budget, scratch: ScratchKey) -> ResId {
    let _g = self.owner.enter();
    self.process_returned();

    let size = res.gpu_size();
    let ts = self.next_ts();
    let id = self.arena.insert(Entry {
      res,
      size,
      budget,
      scratch,
      unique: UniqueKey::default(),
      refs: 1,
      cb_refs: 0,
      loc: Loc::NonPurgeable(self.non_purgeable.len() as u32),
      ts,
      since: Instant::now(),
      in_scratch: false,
    });
    self.non_purgeable.push(id);

    self.bytes += size;
    self.add_budget_totals(budget, size);
    self.high_count = self.high_count.max(self.arena.len());
    self.high_bytes = self.high_bytes.max(self.bytes);
    log::trace!("cache {}: insert {id:?} {size}B {budget:?}", self.id);

    self.purge_as_needed();
    id
  }

  /// Check out one idle resource with `key`
  /// 取出一个持有 `key` 的空闲资源
  pub fn find_and_ref_scratch(&mut self, key: &ScratchKey) -> Option<ResId> {
    let _g = self.owner.enter();
    let id = match self.scratch_pop(key) {
      Some(id) => id,
      None => {
        self.process_returned();
        self.scratch_pop(key)?
      }
    };
    self.ref_entry(id, RefKind::Usage);
    Some(id)
  }

  pub fn find_unique(&mut self, key: &UniqueKey) -> Option<ResId> {
    let _g = self.owner.enter();
    let hit = self.unique_map.get(key).copied();
    let id = match hit {
      Some(id) => id,
      None => {
        self.process_returned();
        *self.unique_map.get(key)?
      }
    };
    self.ref_entry(id, RefKind::Usage);
    Some(id)
  }

  /// Lookup without taking a reference
  /// 查找，不增加引用
  #[inline]
  pub fn has_unique(&self, key: &UniqueKey) -> bool {
    self.unique_map.contains_key(key)
  }

  /// Returns false for a stale id
  /// 旧 id 返回 false
  pub fn add_ref(&mut self, id: ResId, kind: RefKind) -> bool {
    let _g = self.owner.enter();
    if !self.arena.contains(id) {
      return false;
    }
    self.ref_entry(id, kind);
    true
  }

  /// Usage reference droppable on any thread
  /// 可在任意线程 drop 的使用引用
  pub fn share(&mut self, id: ResId) -> Option<ResRef> {
    if !self.add_ref(id, RefKind::Usage) {
      return None;
    }
    Some(ResRef::new(id, self.ret_tx.clone()))
  }

  /// Drop one reference of `kind`
  /// 释放一个 `kind` 引用
  pub fn release(&mut self, id: ResId, kind: RefKind) {
    let _g = self.owner.enter();
    let Some(e) = self.arena.get_mut(id) else {
      log::warn!("cache {}: release of stale {id:?}", self.id);
      return;
    };
    let n = e.refs_mut(kind);
    debug_assert!(*n > 0, "release without ref");
    if *n == 0 {
      return;
    }
    *n -= 1;
    if *n > 0 {
      return;
    }
    if kind == RefKind::Usage {
      self.sync_scratch(id);
    }
    if !self.arena[id].purgeable() {
      return;
    }

    let ts = self.next_ts();
    self.np_remove(id);
    let e = &mut self.arena[id];
    e.ts = ts;
    e.since = Instant::now();
    let size = e.size;
    self.pq.push(id, &mut self.arena);
    self.purgeable_bytes += size;

    let e = &self.arena[id];
    let (budget, scratch, unique) = (e.budget, e.scratch.is_valid(), e.unique.is_valid());
    let keep = match budget {
      Budget::Budgeted => (scratch || unique) && !self.over_budget(),
      Budget::UnbudgetedCacheable if unique => true,
      _ => {
        // Adopt into the budget only if nothing must be purged for it
        // 仅当无需为其清理任何资源时才纳入预算
        if scratch && !unique && self.would_fit(size) {
          self.change_budget(id, Budget::Budgeted);
          true
        } else {
          false
        }
      }
    };
    if !keep {
      self.destroy(id);
    }
  }

  /// Give `id` the unique key, evicting any previous holder's claim
  /// 为 `id` 设置唯一键，驱逐原持有者
  pub fn set_unique_key(&mut self, id: ResId, key: UniqueKey) -> bool {
    let _g = self.owner.enter();
    if !self.arena.contains(id) {
      return false;
    }
    if !key.is_valid() {
      self.drop_unique(id);
      return true;
    }
    if let Some(&old) = self.unique_map.get(&key) {
      if old == id {
        // Same holder, refresh payload
        // 同一持有者，刷新附带数据
        self.unique_map.remove(&key);
        self.unique_map.insert(key.clone(), id);
        self.arena[id].unique = key;
        return true;
      }
      self.drop_unique(old);
    }
    let e = &mut self.arena[id];
    if e.unique.is_valid() {
      let prev = std::mem::take(&mut e.unique);
      self.unique_map.remove(&prev);
    }
    self.arena[id].unique = key.clone();
    self.unique_map.insert(key, id);
    self.sync_scratch(id);
    true
  }

  /// Drop the unique key; an idle resource then goes through the release policy again
  /// 移除唯一键；空闲资源随后重新经过释放策略
  pub fn remove_unique_key(&mut self, id: ResId) {
    let _g = self.owner.enter();
    if self.arena.contains(id) {
      self.drop_unique(id);
    }
  }

  /// Move between budgeted and unbudgeted-uncacheable
  /// 在预算内与不可缓存的预算外之间切换
  pub fn set_budgeted(&mut self, id: ResId, budgeted: bool) {
    let _g = self.owner.enter();
    if !self.arena.contains(id) {
      return;
    }
    let to = if budgeted {
      Budget::Budgeted
    } else {
      Budget::UnbudgetedUncacheable
    };
    if self.arena[id].budget == to {
      return;
    }
    self.change_budget(id, to);
    if budgeted {
      self.purge_as_needed();
    }
  }

  /// Change the byte budget and purge toward it
  /// 修改字节预算并按其清理
  pub fn set_limit(&mut self, max_bytes: usize) {
    let _g = self.owner.enter();
    self.max_bytes = max_bytes;
    self.purge_as_needed();
  }

  /// Apply releases posted by dropped `ResRef`s
  /// 执行已 drop 的 `ResRef` 投递的释放
  pub fn process_returned(&mut self) {
    let li: Vec<ResId> = self.ret_rx.try_iter().collect();
    for id in li {
      if self.arena.contains(id) {
        self.release(id, RefKind::Usage);
      }
    }
  }

  #[inline]
  pub fn count(&self) -> usize {
    self.arena.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.arena.is_empty()
  }

  #[inline]
  pub fn bytes(&self) -> usize {
    self.bytes
  }

  #[inline]
  pub fn budgeted_bytes(&self) -> usize {
    self.budgeted_bytes
  }

  #[inline]
  pub fn budgeted_count(&self) -> usize {
    self.budgeted_count
  }

  #[inline]
  pub fn purgeable_bytes(&self) -> usize {
    self.purgeable_bytes
  }

  #[inline]
  pub fn max_bytes(&self) -> usize {
    self.max_bytes
  }

  #[inline]
  pub fn over_budget(&self) -> bool {
    self.budgeted_bytes > self.max_bytes
  }

  /// Whether `size` more budgeted bytes fit without purging
  /// 再加 `size` 字节预算内资源是否无需清理
  #[inline]
  pub fn would_fit(&self, size: usize) -> bool {
    self.budgeted_bytes + size <= self.max_bytes
  }

  #[inline]
  pub fn contains(&self, id: ResId) -> bool {
    self.arena.contains(id)
  }

  #[inline]
  pub fn get(&self, id: ResId) -> Option<&R> {
    self.arena.get(id).map(|e| &e.res)
  }

  pub fn refs(&self, id: ResId, kind: RefKind) -> u32 {
    self.arena.get(id).map_or(0, |e| match kind {
      RefKind::Usage => e.refs,
      RefKind::CommandBuffer => e.cb_refs,
    })
  }

  pub fn is_purgeable(&self, id: ResId) -> bool {
    self
      .arena
      .get(id)
      .is_some_and(|e| matches!(e.loc, Loc::Purgeable(_)))
  }

  pub fn timestamp(&self, id: ResId) -> Option<u32> {
    self.arena.get(id).map(|e| e.ts)
  }

  pub fn budget(&self, id: ResId) -> Option<Budget> {
    self.arena.get(id).map(|e| e.budget)
  }

  pub fn scratch_key(&self, id: ResId) -> Option<&ScratchKey> {
    self.arena.get(id).map(|e| &e.scratch)
  }

  pub fn unique_key(&self, id: ResId) -> Option<&UniqueKey> {
    self
      .arena
      .get(id)
      .map(|e| &e.unique)
      .filter(|k| k.is_valid())
  }

  /// Least recently used purgeable resource
  /// 最久未用的可清理资源
  #[inline]
  pub fn top_of_purgeable(&self) -> Option<ResId> {
    self.pq.peek()
  }

  pub fn stats(&self) -> Stats {
    Stats {
      count: self.arena.len(),
      bytes: self.bytes,
      budgeted_count: self.budgeted_count,
      budgeted_bytes: self.budgeted_bytes,
      purgeable_bytes: self.purgeable_bytes,
      unbudgeted_cacheable_bytes: self.unbudgeted_cacheable_bytes,
      max_bytes: self.max_bytes,
      high_count: self.high_count,
      high_bytes: self.high_bytes,
      scratch: self.scratch_map.values().map(Vec::len).sum(),
      unique: self.unique_map.len(),
    }
  }

  /// Unique keys carrying `tag`
  /// 带 `tag` 的唯一键数
  pub fn count_tagged(&self, tag: &str) -> usize {
    self
      .unique_map
      .keys()
      .filter(|k| k.tag() == Some(tag))
      .count()
  }

  /// Force the next timestamp, for wraparound tests
  /// 强制设定下一个时间戳，用于回绕测试
  #[doc(hidden)]
  pub fn set_next_ts(&mut self, ts: u32) {
    self.ts = ts;
  }

  // Add a reference, pulling the entry out of the purgeable queue
  // 增加引用，并将条目移出可清理队列
  pub(crate) fn ref_entry(&mut self, id: ResId, kind: RefKind) {
    if let Loc::Purgeable(pos) = self.arena[id].loc {
      self.pq.remove(pos as usize, &mut self.arena);
      self.purgeable_bytes -= self.arena[id].size;
      self.np_push(id);
    }
    *self.arena[id].refs_mut(kind) += 1;
    if kind == RefKind::Usage {
      self.sync_scratch(id);
    }
    let ts = self.next_ts();
    self.arena[id].ts = ts;
  }

  // Ref around the key removal so an idle holder is kept or destroyed by release
  // 移除键期间持有引用，空闲持有者的去留由 release 决定
  pub(crate) fn drop_unique(&mut self, id: ResId) {
    if !self.arena[id].purgeable() {
      self.unindex_unique(id);
      return;
    }
    self.ref_entry(id, RefKind::Usage);
    self.unindex_unique(id);
    self.release(id, RefKind::Usage);
  }

  pub(crate) fn unindex_unique(&mut self, id: ResId) {
    let prev = std::mem::take(&mut self.arena[id].unique);
    if prev.is_valid() {
      self.unique_map.remove(&prev);
    }
    self.sync_scratch(id);
  }

  pub(crate) fn change_budget(&mut self, id: ResId, to: Budget) {
    let e = &mut self.arena[id];
    let (from, size) = (e.budget, e.size);
    e.budget = to;
    self.sub_budget_totals(from, size);
    self.add_budget_totals(to, size);
    self.sync_scratch(id);
  }

  fn add_budget_totals(&mut self, budget: Budget, size: usize) {
    match budget {
      Budget::Budgeted => {
        self.budgeted_bytes += size;
        self.budgeted_count += 1;
      }
      Budget::UnbudgetedCacheable => self.unbudgeted_cacheable_bytes += size,
      Budget::UnbudgetedUncacheable => {}
    }
  }

  fn sub_budget_totals(&mut self, budget: Budget, size: usize) {
    match budget {
      Budget::Budgeted => {
        self.budgeted_bytes -= size;
        self.budgeted_count -= 1;
      }
      Budget::UnbudgetedCacheable => self.unbudgeted_cacheable_bytes -= size,
      Budget::UnbudgetedUncacheable => {}
    }
  }

  /// Remove from every index and hand the resource to `on_free`
  /// 从所有索引移除并交给 `on_free`
  pub(crate) fn destroy(&mut self, id: ResId) {
    let e = &self.arena[id];
    let (loc, size, budget, in_scratch) = (e.loc, e.size, e.budget, e.in_scratch);
    match loc {
      Loc::Purgeable(pos) => {
        self.pq.remove(pos as usize, &mut self.arena);
        self.purgeable_bytes -= size;
      }
      Loc::NonPurgeable(_) => self.np_remove(id),
    }
    if in_scratch {
      self.scratch_remove(id);
    }
    let Some(e) = self.arena.remove(id) else {
      return;
    };
    if e.unique.is_valid() {
      self.unique_map.remove(&e.unique);
    }
    self.bytes -= size;
    self.sub_budget_totals(budget, size);
    log::trace!("cache {}: destroy {id:?} {size}B", self.id);
    self.on_free.free(id, e.res);
  }

  // Keep scratch map membership equal to usable-as-scratch
  // 保持临时键表成员与“可作临时资源”一致
  pub(crate) fn sync_scratch(&mut self, id: ResId) {
    let e = &self.arena[id];
    match (e.usable_as_scratch(), e.in_scratch) {
      (true, false) => {
        let key = e.scratch.clone();
        self.scratch_map.entry(key).or_default().push(id);
        self.arena[id].in_scratch = true;
      }
      (false, true) => self.scratch_remove(id),
      _ => {}
    }
  }

  fn scratch_pop(&mut self, key: &ScratchKey) -> Option<ResId> {
    let li = self.scratch_map.get_mut(key)?;
    let id = li.pop()?;
    if li.is_empty() {
      self.scratch_map.remove(key);
    }
    self.arena[id].in_scratch = false;
    Some(id)
  }

  fn scratch_remove(&mut self, id: ResId) {
    let e = &mut self.arena[id];
    e.in_scratch = false;
    if let Some(li) = self.scratch_map.get_mut(&e.scratch) {
      if let Some(pos) = li.iter().position(|&x| x == id) {
        li.swap_remove(pos);
      }
      if li.is_empty() {
        self.scratch_map.remove(&e.scratch);
      }
    }
  }

  fn np_push(&mut self, id: ResId) {
    self.arena[id].loc = Loc::NonPurgeable(self.non_purgeable.len() as u32);
    self.non_purgeable.push(id);
  }

  fn np_remove(&mut self, id: ResId) {
    let Loc::NonPurgeable(pos) = self.arena[id].loc else {
      return;
    };
    let pos = pos as usize;
    self.non_purgeable.swap_remove(pos);
    if let Some(&moved) = self.non_purgeable.get(pos) {
      self.arena[moved].loc = Loc::NonPurgeable(pos as u32);
    }
  }
}

impl<R: Gpu, F: OnFree<R>> BudgetSource for ResourceCache<R, F> {
  // Views dropped by the secondary cache come back through the return queue
  // 二级缓存释放的视图经归还队列返回
  fn over_budget(&mut self) -> bool {
    self.process_returned();
    ResourceCache::over_budget(self)
  }
}
