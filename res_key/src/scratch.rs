//! Scratch keys: shared by interchangeable resources
//! 临时键：可互换资源共享

use std::{
  ops::{Deref, Index, IndexMut},
  sync::atomic::{AtomicU32, Ordering},
};

use crate::key::{Builder, ResourceKey};

/// Scratch resource type, stored in the domain half of the header
/// 临时资源类型，存放在头部的域字段
pub type ResourceType = u16;

static NEXT_TYPE: AtomicU32 = AtomicU32::new(1);

/// Many resources may hold an equal scratch key at once
/// 同一临时键可同时被多个资源持有
#[derive(Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct ScratchKey(ResourceKey);

impl ScratchKey {
  /// Allocate a process-unique resource type, never 0
  /// 分配进程内唯一的资源类型，永不为 0
  pub fn generate_resource_type() -> ResourceType {
    let t = NEXT_TYPE.fetch_add(1, Ordering::Relaxed);
    assert!(t <= ResourceType::MAX as u32, "resource type overflow");
    t as ResourceType
  }

  #[inline]
  pub fn builder(ty: ResourceType, data_cnt: usize) -> ScratchBuilder {
    ScratchBuilder(Builder::new(ty, data_cnt))
  }

  #[inline]
  pub fn resource_type(&self) -> ResourceType {
    self.0.domain()
  }
}

impl Deref for ScratchKey {
  type Target = ResourceKey;

  #[inline]
  fn deref(&self) -> &ResourceKey {
    &self.0
  }
}

pub struct ScratchBuilder(Builder);

impl ScratchBuilder {
  #[inline]
  pub fn data_mut(&mut self) -> &mut [u32] {
    self.0.data_mut()
  }

  #[inline]
  pub fn finish(self) -> ScratchKey {
    ScratchKey(self.0.finish())
  }
}

impl Index<usize> for ScratchBuilder {
  type Output = u32;

  #[inline]
  fn index(&self, i: usize) -> &u32 {
    &self.0[i]
  }
}

impl IndexMut<usize> for ScratchBuilder {
  #[inline]
  fn index_mut(&mut self, i: usize) -> &mut u32 {
    &mut self.0[i]
  }
}
