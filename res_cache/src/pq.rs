//! Purgeable queue: binary min-heap on timestamp
//! 可清理队列：按时间戳的二叉最小堆
//!
//! Each entry records its heap slot in `Loc::Purgeable`, so removal from
//! the middle is O(log n).
//! 每个条目在 `Loc::Purgeable` 中记录堆位置，中间删除为 O(log n)。

use crate::{
  ResId,
  arena::Arena,
  entry::{Entry, Loc},
};

pub(crate) struct Pq {
  pub heap: Vec<ResId>,
}

type Slots<R> = Arena<Entry<R>>;

impl Pq {
  pub fn new() -> Self {
    Self { heap: Vec::new() }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.heap.len()
  }

  #[inline]
  pub fn peek(&self) -> Option<ResId> {
    self.heap.first().copied()
  }

  pub fn push<R>(&mut self, id: ResId, slots: &mut Slots<R>) {
    let pos = self.heap.len();
    self.heap.push(id);
    self.up(pos, slots);
  }

  pub fn remove<R>(&mut self, pos: usize, slots: &mut Slots<R>) -> ResId {
    let id = self.heap.swap_remove(pos);
    if pos < self.heap.len() {
      self.set(pos, slots);
      self.down(pos, slots);
      self.up(pos, slots);
    }
    id
  }

  /// Replace content with ids already sorted by timestamp
  /// 用已按时间戳排序的 id 替换内容
  pub fn reset_sorted<R>(&mut self, sorted: Vec<ResId>, slots: &mut Slots<R>) {
    self.heap = sorted;
    for pos in 0..self.heap.len() {
      self.set(pos, slots);
    }
  }

  /// Ids ordered oldest first, heap untouched
  /// 按从旧到新排序的 id，不改动堆
  pub fn sorted<R>(&self, slots: &Slots<R>) -> Vec<ResId> {
    let mut li = self.heap.clone();
    li.sort_by_key(|id| slots[*id].ts);
    li
  }

  #[inline]
  fn ts<R>(&self, pos: usize, slots: &Slots<R>) -> u32 {
    slots[self.heap[pos]].ts
  }

  #[inline]
  fn set<R>(&self, pos: usize, slots: &mut Slots<R>) {
    slots[self.heap[pos]].loc = Loc::Purgeable(pos as u32);
  }

  fn up<R>(&mut self, mut pos: usize, slots: &mut Slots<R>) {
    while pos > 0 {
      let parent = (pos - 1) / 2;
      if self.ts(parent, slots) <= self.ts(pos, slots) {
        break;
      }
      self.heap.swap(parent, pos);
      self.set(pos, slots);
      pos = parent;
    }
    self.set(pos, slots);
  }

  fn down<R>(&mut self, mut pos: usize, slots: &mut Slots<R>) {
    let n = self.heap.len();
    loop {
      let l = pos * 2 + 1;
      if l >= n {
        break;
      }
      let r = l + 1;
      let child = if r < n && self.ts(r, slots) < self.ts(l, slots) {
        r
      } else {
        l
      };
      if self.ts(pos, slots) <= self.ts(child, slots) {
        break;
      }
      self.heap.swap(pos, child);
      self.set(pos, slots);
      pos = child;
    }
    self.set(pos, slots);
  }
}
