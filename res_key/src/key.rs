//! Base resource key and its builder
//! 基础资源键及其构建器
//!
//! Layout: `[hash, domain | byte_len << 16, data...]`
//! 布局：`[哈希, 域 | 字节长度 << 16, 数据...]`

use std::{
  fmt,
  hash::{Hash, Hasher},
  ops::{Index, IndexMut},
};

use xxhash_rust::xxh32::Xxh32;

/// Key domain, 0 is reserved for invalid keys
/// 键域，0 保留给无效键
pub type Domain = u16;

pub const INVALID_DOMAIN: Domain = 0;

const HASH_IDX: usize = 0;
const DOMAIN_AND_SIZE_IDX: usize = 1;

// Header words before payload
// 载荷前的头部字数
pub(crate) const META_CNT: usize = 2;

const INVALID_META: [u32; META_CNT] = [0, ((META_CNT * 4) as u32) << 16];

/// Hashed, domain-tagged sequence of 32-bit words
/// 带哈希和域标记的 32 位字序列
#[derive(Clone)]
pub struct ResourceKey {
  words: Box<[u32]>,
}

impl Default for ResourceKey {
  #[inline]
  fn default() -> Self {
    Self {
      words: Box::new(INVALID_META),
    }
  }
}

impl ResourceKey {
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.domain() != INVALID_DOMAIN
  }

  /// Reset to the invalid key
  /// 重置为无效键
  #[inline]
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  #[inline]
  pub fn hash(&self) -> u32 {
    self.words[HASH_IDX]
  }

  /// Total bytes including header
  /// 含头部的总字节数
  #[inline]
  pub fn size(&self) -> usize {
    (self.words[DOMAIN_AND_SIZE_IDX] >> 16) as usize
  }

  #[inline]
  pub fn domain(&self) -> Domain {
    (self.words[DOMAIN_AND_SIZE_IDX] & 0xffff) as Domain
  }

  /// Payload words
  /// 载荷字
  #[inline]
  pub fn data(&self) -> &[u32] {
    &self.words[META_CNT..]
  }

  /// Payload bytes
  /// 载荷字节数
  #[inline]
  pub fn data_size(&self) -> usize {
    self.size() - META_CNT * 4
  }
}

impl PartialEq for ResourceKey {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    // Hash first, cheap reject
    // 先比哈希，快速排除
    self.hash() == other.hash() && self.words == other.words
  }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
  #[inline]
  fn hash<H: Hasher>(&self, state: &mut H) {
    state.write_u32(ResourceKey::hash(self));
  }
}

impl fmt::Debug for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceKey")
      .field("domain", &self.domain())
      .field("hash", &format_args!("{:#010x}", self.hash()))
      .field("data", &self.data())
      .finish()
  }
}

/// Writable key under construction, `finish` computes the hash
/// 构建中的可写键，`finish` 计算哈希
pub struct Builder {
  words: Vec<u32>,
}

impl Builder {
  pub(crate) fn new(domain: Domain, data_cnt: usize) -> Self {
    debug_assert!(domain != INVALID_DOMAIN, "domain 0 is reserved");
    let size = (META_CNT + data_cnt) * 4;
    debug_assert!(size <= u16::MAX as usize, "key too large: {size} bytes");
    let mut words = vec![0; META_CNT + data_cnt];
    words[DOMAIN_AND_SIZE_IDX] = domain as u32 | ((size as u32) << 16);
    Self { words }
  }

  /// Payload slots
  /// 载荷槽位
  #[inline]
  pub fn data_mut(&mut self) -> &mut [u32] {
    &mut self.words[META_CNT..]
  }

  #[inline]
  pub fn data_cnt(&self) -> usize {
    self.words.len() - META_CNT
  }

  pub(crate) fn finish(mut self) -> ResourceKey {
    let mut h = Xxh32::new(0);
    for w in &self.words[DOMAIN_AND_SIZE_IDX..] {
      h.update(&w.to_le_bytes());
    }
    self.words[HASH_IDX] = h.digest();
    ResourceKey {
      words: self.words.into_boxed_slice(),
    }
  }
}

impl Index<usize> for Builder {
  type Output = u32;

  #[inline]
  fn index(&self, i: usize) -> &u32 {
    &self.words[META_CNT + i]
  }
}

impl IndexMut<usize> for Builder {
  #[inline]
  fn index_mut(&mut self, i: usize) -> &mut u32 {
    debug_assert!(i < self.data_cnt());
    &mut self.words[META_CNT + i]
  }
}
