//! Unique keys: at most one resource holds a given key
//! 唯一键：同一键最多由一个资源持有

use std::{
  fmt,
  hash::{Hash, Hasher},
  ops::{Deref, Index, IndexMut},
  sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
  },
};

use crate::key::{Builder, Domain, ResourceKey};

static NEXT_DOMAIN: AtomicU32 = AtomicU32::new(1);

/// Unique key with optional opaque payload and debug tag
/// 唯一键，可附带不透明数据和调试标签
///
/// Payload and tag do not take part in equality or hashing
/// 数据和标签不参与相等比较和哈希
#[derive(Clone, Default)]
pub struct UniqueKey {
  key: ResourceKey,
  data: Option<Arc<[u8]>>,
  tag: Option<&'static str>,
}

impl UniqueKey {
  /// Allocate a process-unique domain, never 0
  /// 分配进程内唯一的域，永不为 0
  pub fn generate_domain() -> Domain {
    let d = NEXT_DOMAIN.fetch_add(1, Ordering::Relaxed);
    assert!(d <= Domain::MAX as u32, "unique key domain overflow");
    d as Domain
  }

  #[inline]
  pub fn builder(domain: Domain, data_cnt: usize, tag: Option<&'static str>) -> UniqueBuilder {
    UniqueBuilder {
      b: Builder::new(domain, data_cnt),
      tag,
    }
  }

  /// Derive a key from `inner` plus `extra_cnt` leading words
  /// 由 `inner` 加 `extra_cnt` 个前置字派生新键
  ///
  /// Payload: `[extra..., inner.domain, inner.data...]`
  pub fn wrap(
    inner: &UniqueKey,
    domain: Domain,
    extra_cnt: usize,
    tag: Option<&'static str>,
  ) -> UniqueBuilder {
    let inner_data = inner.data();
    let mut b = Builder::new(domain, extra_cnt + 1 + inner_data.len());
    let d = b.data_mut();
    d[extra_cnt] = inner.domain() as u32;
    d[extra_cnt + 1..].copy_from_slice(inner_data);
    UniqueBuilder { b, tag }
  }

  #[inline]
  pub fn tag(&self) -> Option<&'static str> {
    self.tag
  }

  #[inline]
  pub fn custom_data(&self) -> Option<&Arc<[u8]>> {
    self.data.as_ref()
  }

  #[inline]
  pub fn set_custom_data(&mut self, data: Option<Arc<[u8]>>) {
    self.data = data;
  }

  #[inline]
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

impl Deref for UniqueKey {
  type Target = ResourceKey;

  #[inline]
  fn deref(&self) -> &ResourceKey {
    &self.key
  }
}

impl PartialEq for UniqueKey {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.key == other.key
  }
}

impl Eq for UniqueKey {}

impl Hash for UniqueKey {
  #[inline]
  fn hash<H: Hasher>(&self, state: &mut H) {
    Hash::hash(&self.key, state);
  }
}

impl fmt::Debug for UniqueKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut d = f.debug_struct("UniqueKey");
    d.field("key", &self.key);
    if let Some(tag) = self.tag {
      d.field("tag", &tag);
    }
    d.finish()
  }
}

pub struct UniqueBuilder {
  b: Builder,
  tag: Option<&'static str>,
}

impl UniqueBuilder {
  #[inline]
  pub fn data_mut(&mut self) -> &mut [u32] {
    self.b.data_mut()
  }

  #[inline]
  pub fn finish(self) -> UniqueKey {
    UniqueKey {
      key: self.b.finish(),
      data: None,
      tag: self.tag,
    }
  }
}

impl Index<usize> for UniqueBuilder {
  type Output = u32;

  #[inline]
  fn index(&self, i: usize) -> &u32 {
    &self.b[i]
  }
}

impl IndexMut<usize> for UniqueBuilder {
  #[inline]
  fn index_mut(&mut self, i: usize) -> &mut u32 {
    &mut self.b[i]
  }
}
