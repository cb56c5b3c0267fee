//! Unique key invalidation messages
//! 唯一键失效消息

use msg_bus::{Bus, Routed};
use res_key::UniqueKey;

/// "This key is no longer valid" for the cache with id `owner`
/// 通知 id 为 `owner` 的缓存："该键已失效"
#[derive(Clone, Debug)]
pub struct UniqueKeyInvalidated {
  pub key: UniqueKey,
  pub owner: u32,
  /// Key lives in the secondary cache, not the main one
  /// 键位于二级缓存而非主缓存
  pub in_ts_cache: bool,
}

impl Routed for UniqueKeyInvalidated {
  #[inline]
  fn dest(&self) -> u32 {
    self.owner
  }
}

#[static_init::dynamic]
pub(crate) static BUS: Bus<UniqueKeyInvalidated> = Bus::new();

impl UniqueKeyInvalidated {
  pub fn new(key: UniqueKey, owner: u32) -> Self {
    Self {
      key,
      owner,
      in_ts_cache: false,
    }
  }

  pub fn ts_cache(key: UniqueKey, owner: u32) -> Self {
    Self {
      key,
      owner,
      in_ts_cache: true,
    }
  }

  /// Post from any thread, returns number of caches reached
  /// 可从任意线程投递，返回送达的缓存数
  #[inline]
  pub fn post(self) -> usize {
    BUS.post(self)
  }
}
