//! Slot storage addressed by `ResId`
//! 以 `ResId` 寻址的槽位存储

use std::ops::{Index, IndexMut};

use crate::ResId;

struct Slot<T> {
  ver: u32,
  val: Option<T>,
}

pub(crate) struct Arena<T> {
  slots: Vec<Slot<T>>,
  free: Vec<u32>,
  len: usize,
}

impl<T> Arena<T> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      len: 0,
    }
  }

  pub fn insert(&mut self, val: T) -> ResId {
    self.len += 1;
    if let Some(idx) = self.free.pop() {
      let slot = &mut self.slots[idx as usize];
      slot.val = Some(val);
      return ResId { idx, ver: slot.ver };
    }
    let idx = self.slots.len() as u32;
    self.slots.push(Slot {
      ver: 0,
      val: Some(val),
    });
    ResId { idx, ver: 0 }
  }

  #[inline]
  pub fn get(&self, id: ResId) -> Option<&T> {
    self
      .slots
      .get(id.idx as usize)
      .filter(|s| s.ver == id.ver)
      .and_then(|s| s.val.as_ref())
  }

  #[inline]
  pub fn get_mut(&mut self, id: ResId) -> Option<&mut T> {
    self
      .slots
      .get_mut(id.idx as usize)
      .filter(|s| s.ver == id.ver)
      .and_then(|s| s.val.as_mut())
  }

  #[inline]
  pub fn contains(&self, id: ResId) -> bool {
    self.get(id).is_some()
  }

  pub fn remove(&mut self, id: ResId) -> Option<T> {
    let slot = self.slots.get_mut(id.idx as usize)?;
    if slot.ver != id.ver {
      return None;
    }
    let val = slot.val.take()?;
    // Bump so stale handles miss
    // 递增代数，使旧句柄失效
    slot.ver = slot.ver.wrapping_add(1);
    self.free.push(id.idx);
    self.len -= 1;
    Some(val)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = (ResId, &T)> {
    self.slots.iter().enumerate().filter_map(|(i, s)| {
      s.val.as_ref().map(|v| {
        (
          ResId {
            idx: i as u32,
            ver: s.ver,
          },
          v,
        )
      })
    })
  }
}

// Live handles only, stale ones are a bug
// 仅用于存活句柄，旧句柄属于程序错误
impl<T> Index<ResId> for Arena<T> {
  type Output = T;

  #[inline]
  fn index(&self, id: ResId) -> &T {
    match self.get(id) {
      Some(v) => v,
      None => panic!("stale {id:?}"),
    }
  }
}

impl<T> IndexMut<ResId> for Arena<T> {
  #[inline]
  fn index_mut(&mut self, id: ResId) -> &mut T {
    match self.get_mut(id) {
      Some(v) => v,
      None => panic!("stale {id:?}"),
    }
  }
}
