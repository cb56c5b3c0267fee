use coarsetime::Instant;
use res_key::{ScratchKey, UniqueKey};

use crate::{Budget, RefKind};

/// Which container holds the entry, and where
/// 条目所在容器及位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Loc {
  NonPurgeable(u32),
  Purgeable(u32),
}

pub(crate) struct Entry<R> {
  pub res: R,
  pub size: usize,
  pub budget: Budget,
  pub scratch: ScratchKey,
  pub unique: UniqueKey,
  pub refs: u32,
  pub cb_refs: u32,
  pub loc: Loc,
  pub ts: u32,
  // Time it last became purgeable
  // 最近一次变为可清理的时间
  pub since: Instant,
  pub in_scratch: bool,
}

impl<R> Entry<R> {
  #[inline]
  pub fn usable_as_scratch(&self) -> bool {
    self.scratch.is_valid()
      && !self.unique.is_valid()
      && self.budget == Budget::Budgeted
      && self.refs == 0
  }

  #[inline]
  pub fn purgeable(&self) -> bool {
    self.refs == 0 && self.cb_refs == 0
  }

  #[inline]
  pub fn refs_mut(&mut self, kind: RefKind) -> &mut u32 {
    match kind {
      RefKind::Usage => &mut self.refs,
      RefKind::CommandBuffer => &mut self.cb_refs,
    }
  }
}
