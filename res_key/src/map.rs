//! Maps keyed by resource keys, reusing the stored content hash
//! 以资源键为键的映射，直接复用已存的内容哈希

use std::{
  collections::HashMap,
  hash::{BuildHasherDefault, Hasher},
};

/// Pass-through hasher for keys that already carry a 32-bit hash
/// 直通哈希器，用于自带 32 位哈希的键
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyHasher(u64);

impl Hasher for KeyHasher {
  #[inline]
  fn finish(&self) -> u64 {
    self.0
  }

  // Mirror into the high half so tag bits vary too
  // 复制到高 32 位，使标签位同样有区分度
  #[inline]
  fn write_u32(&mut self, n: u32) {
    let n = u64::from(n);
    self.0 = (n << 32) | n;
  }

  fn write(&mut self, bytes: &[u8]) {
    for &b in bytes {
      self.0 = self.0.rotate_left(8) ^ u64::from(b);
    }
  }
}

pub type BuildKeyHasher = BuildHasherDefault<KeyHasher>;

/// `HashMap` keyed by `ScratchKey` or `UniqueKey`
/// 以 `ScratchKey` 或 `UniqueKey` 为键的 `HashMap`
pub type KeyMap<K, V> = HashMap<K, V, BuildKeyHasher>;
