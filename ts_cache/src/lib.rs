//! Thread-safe secondary cache keyed by `UniqueKey`
//!
//! Views computed on any thread are published here and shared by later
//! lookups. Entries whose view is held only by the cache can be recycled
//! under memory pressure.
//!
//! 以 `UniqueKey` 为键的线程安全二级缓存
//!
//! 任意线程计算出的视图在此发布并被后续查找共享。
//! 仅被缓存持有的条目可在内存压力下回收。

#![cfg_attr(docsrs, feature(doc_cfg))]

mod cache;

pub use cache::ThreadSafeCache;
pub use coarsetime::Instant;
use res_key::UniqueKey;

/// Source of over-budget status consulted while recycling
/// 回收时查询的超预算状态来源
///
/// Asked before each entry is recycled, so it may first apply the effect of
/// views dropped so far.
/// 每回收一个条目前询问，可先处理此前已释放视图的影响。
pub trait BudgetSource {
  fn over_budget(&mut self) -> bool;
}

/// Type-erased face of a secondary cache, as seen by its owner
/// 二级缓存对拥有者暴露的类型擦除接口
pub trait Secondary: Send + Sync {
  fn remove(&self, key: &UniqueKey);

  /// Recycle uniquely held entries from the LRU end
  /// 从 LRU 端回收仅被缓存持有的条目
  fn drop_unique_refs(&self, budget: Option<&mut dyn BudgetSource>);

  fn drop_unique_refs_older_than(&self, cutoff: Instant);

  fn drop_all_refs(&self);
}
