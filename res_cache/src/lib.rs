//! Budgeted GPU resource cache
//!
//! Resources are registered once and addressed by generation-checked
//! `ResId`s. Idle resources stay cached in least-recently-used order and
//! are purged when the budget is exceeded. Two key kinds index them:
//!
//! - `ScratchKey`: interchangeable, checked out one at a time
//! - `UniqueKey`: exclusive, found by exact lookup
//!
//! Other threads reach the cache only through the invalidation bus
//! (`UniqueKeyInvalidated::post`) and the return queue (`ResRef` drop).
//!
//! 带预算的 GPU 资源缓存
//!
//! 资源只注册一次，用带代数校验的 `ResId` 寻址。空闲资源按最近最少使用顺序
//! 保留在缓存中，超出预算时清理。两种键为其建立索引：
//!
//! - `ScratchKey`：可互换，每次取出一个
//! - `UniqueKey`：独占，按精确查找
//!
//! 其他线程只能通过失效总线（`UniqueKeyInvalidated::post`）和归还队列
//! （`ResRef` drop）访问缓存。

#![cfg_attr(docsrs, feature(doc_cfg))]

mod arena;
mod cache;
mod conf;
mod entry;
mod error;
mod msg;
mod owner;
mod pq;
mod purge;
mod res;
mod share;
mod stamp;
mod stats;
mod validate;

pub use cache::ResourceCache;
pub use coarsetime::Instant;
pub use conf::{Conf, Config, default};
pub use error::{Error, Result};
pub use msg::UniqueKeyInvalidated;
pub use res::{Budget, Gpu, NoFree, OnFree, RefKind, ResId};
pub use res_key::{ScratchKey, UniqueKey};
pub use share::ResRef;
pub use stats::Stats;
pub use ts_cache::{BudgetSource, Secondary, ThreadSafeCache};
