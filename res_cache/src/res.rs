//! Resource contract and handle types
//! 资源约定与句柄类型

/// What the cache needs from a GPU object
/// 缓存对 GPU 对象的要求
pub trait Gpu {
  /// Bytes of GPU memory, must not change while cached
  /// GPU 内存字节数，缓存期间不可变
  fn gpu_size(&self) -> usize;
}

/// Budget class of a resource
/// 资源的预算类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
  /// Counted against the byte budget
  /// 计入字节预算
  Budgeted,
  /// Outside the budget, kept while it has a unique key
  /// 不计预算，持有唯一键时保留
  UnbudgetedCacheable,
  /// Outside the budget, destroyed once released
  /// 不计预算，释放即销毁
  UnbudgetedUncacheable,
}

/// Kind of strong reference
/// 强引用种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
  Usage,
  /// GPU work in flight
  /// 进行中的 GPU 工作
  CommandBuffer,
}

/// Generation-checked resource handle
/// 带代数校验的资源句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResId {
  pub(crate) idx: u32,
  pub(crate) ver: u32,
}

/// Called with the resource when the cache destroys it
/// 缓存销毁资源时调用
pub trait OnFree<R> {
  fn free(&mut self, id: ResId, res: R);
}

/// Drop the resource in place
/// 原地 drop 资源
pub struct NoFree;

impl<R> OnFree<R> for NoFree {
  #[inline(always)]
  fn free(&mut self, _: ResId, _: R) {}
}

impl<R, F: FnMut(ResId, R)> OnFree<R> for F {
  #[inline]
  fn free(&mut self, id: ResId, res: R) {
    self(id, res)
  }
}
