//! Cross-thread strong reference
//! 跨线程强引用

use std::sync::mpsc::Sender;

use crate::ResId;

/// Usage reference that may be dropped on any thread
/// 可在任意线程 drop 的使用引用
///
/// Drop posts the id to the owning cache's return queue; the cache applies
/// the release on its next drain.
/// drop 时把 id 投递到所属缓存的归还队列，缓存在下次处理时执行释放。
pub struct ResRef {
  id: ResId,
  tx: Sender<ResId>,
}

impl ResRef {
  pub(crate) fn new(id: ResId, tx: Sender<ResId>) -> Self {
    Self { id, tx }
  }

  #[inline]
  pub fn id(&self) -> ResId {
    self.id
  }
}

impl Drop for ResRef {
  fn drop(&mut self) {
    // Cache gone, nothing to return to
    // 缓存已销毁，无需归还
    let _ = self.tx.send(self.id);
  }
}

impl std::fmt::Debug for ResRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_tuple("ResRef").field(&self.id).finish()
  }
}
