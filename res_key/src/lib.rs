//! Hashed resource keys for GPU resource caches
//!
//! Two flavours share one layout:
//! - `ScratchKey`: many interchangeable resources per key
//! - `UniqueKey`: one resource per key, with optional payload
//!
//! GPU 资源缓存的哈希资源键
//!
//! 两种键共享同一布局：
//! - `ScratchKey`：一个键对应多个可互换资源
//! - `UniqueKey`：一个键对应一个资源，可附带数据

#![cfg_attr(docsrs, feature(doc_cfg))]

mod key;
mod map;
mod scratch;
mod unique;

pub use key::{Builder, Domain, INVALID_DOMAIN, ResourceKey};
pub use map::{BuildKeyHasher, KeyHasher, KeyMap};
pub use scratch::{ResourceType, ScratchBuilder, ScratchKey};
pub use unique::{UniqueBuilder, UniqueKey};
