/// Counter snapshot
/// 计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
  pub count: usize,
  pub bytes: usize,
  pub budgeted_count: usize,
  pub budgeted_bytes: usize,
  pub purgeable_bytes: usize,
  pub unbudgeted_cacheable_bytes: usize,
  pub max_bytes: usize,
  pub high_count: usize,
  pub high_bytes: usize,
  /// Resources checked into the scratch map
  /// 位于临时键表中的资源数
  pub scratch: usize,
  pub unique: usize,
}
