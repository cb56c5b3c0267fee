use std::{
  cell::RefCell,
  collections::HashSet,
  rc::Rc,
  sync::{Arc, Barrier},
  thread,
};

use aok::{OK, Void};
use coarsetime::Duration;
use log::info;
use res_cache::{
  Budget, Conf, Error, Gpu, Instant, RefKind, ResId, ResRef, ResourceCache, ScratchKey,
  ThreadSafeCache, UniqueKey, UniqueKeyInvalidated, default,
};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[derive(Debug)]
struct Tex(usize);

impl Gpu for Tex {
  fn gpu_size(&self) -> usize {
    self.0
  }
}

#[static_init::dynamic]
static TY: u16 = ScratchKey::generate_resource_type();

#[static_init::dynamic]
static DOMAIN: u16 = UniqueKey::generate_domain();

fn sk(v: u32) -> ScratchKey {
  let mut b = ScratchKey::builder(*TY, 1);
  b[0] = v;
  b.finish()
}

fn uk(v: u32) -> UniqueKey {
  let mut b = UniqueKey::builder(*DOMAIN, 1, Some("tex"));
  b[0] = v;
  b.finish()
}

fn cache(max: usize) -> ResourceCache<Tex> {
  ResourceCache::new(&[Conf::MaxBytes(max)])
}

type Freed = Rc<RefCell<Vec<ResId>>>;

fn tracked(max: usize) -> (ResourceCache<Tex, impl FnMut(ResId, Tex)>, Freed) {
  let freed: Freed = Rc::default();
  let log = freed.clone();
  let c = ResourceCache::with_on_free(&[Conf::MaxBytes(max)], move |id: ResId, _: Tex| {
    log.borrow_mut().push(id)
  });
  (c, freed)
}

#[test]
fn test_default_budget() -> Void {
  let c: ResourceCache<Tex> = ResourceCache::new(&[]);
  assert_eq!(c.max_bytes(), default::MAX_BYTES);
  assert_eq!(default::MAX_BYTES, 96 * 1024 * 1024);
  assert!(c.is_empty());
  OK
}

#[test]
fn test_lru_purge_on_insert() -> Void {
  info!("> two idle scratch + one referenced unique over 1000B budget");
  let mut c = cache(1000);
  let a = c.insert(Tex(400), Budget::Budgeted, sk(1));
  let b = c.insert(Tex(400), Budget::Budgeted, sk(2));
  c.release(a, RefKind::Usage);
  c.release(b, RefKind::Usage);
  assert_eq!(c.budgeted_bytes(), 800);
  assert_eq!(c.purgeable_bytes(), 800);

  let u = c.insert(Tex(400), Budget::Budgeted, ScratchKey::default());
  assert!(c.set_unique_key(u, uk(1)));

  assert_eq!(c.count(), 2);
  assert_eq!(c.budgeted_bytes(), 800);
  assert!(!c.contains(a));
  assert!(c.contains(b));
  assert!(c.contains(u));
  c.validate();
  OK
}

#[test]
fn test_release_destroys_synchronously() -> Void {
  info!("> uncacheable and over-budget releases");
  let (mut c, freed) = tracked(1000);

  let r = c.insert(Tex(10), Budget::UnbudgetedUncacheable, ScratchKey::default());
  c.release(r, RefKind::Usage);
  assert!(!c.contains(r));
  assert_eq!(*freed.borrow(), vec![r]);

  // Budgeted without any key
  // 预算内但无任何键
  let r = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.release(r, RefKind::Usage);
  assert!(!c.contains(r));

  // Over budget while referenced, destroyed on release
  // 被引用时超预算，释放时销毁
  let big = c.insert(Tex(1500), Budget::Budgeted, sk(2));
  assert!(c.over_budget());
  c.release(big, RefKind::Usage);
  assert!(!c.contains(big));
  assert_eq!(freed.borrow().len(), 3);
  assert_eq!(c.count(), 0);
  assert_eq!(c.bytes(), 0);
  OK
}

#[test]
fn test_unbudgeted_policy() -> Void {
  let mut c = cache(1000);

  // Cacheable with unique key survives release
  // 带唯一键的可缓存资源在释放后保留
  let r = c.insert(Tex(300), Budget::UnbudgetedCacheable, ScratchKey::default());
  c.set_unique_key(r, uk(10));
  c.release(r, RefKind::Usage);
  assert!(c.is_purgeable(r));
  assert_eq!(c.budgeted_bytes(), 0);
  assert_eq!(c.stats().unbudgeted_cacheable_bytes, 300);

  // Cacheable without unique key does not
  // 无唯一键的可缓存资源不保留
  let r2 = c.insert(Tex(300), Budget::UnbudgetedCacheable, ScratchKey::default());
  c.release(r2, RefKind::Usage);
  assert!(!c.contains(r2));

  // Scratch-only unbudgeted that fits is adopted
  // 仅有临时键且放得下的预算外资源被纳入预算
  let r3 = c.insert(Tex(300), Budget::UnbudgetedUncacheable, sk(11));
  c.release(r3, RefKind::Usage);
  assert_eq!(c.budget(r3), Some(Budget::Budgeted));
  assert_eq!(c.budgeted_bytes(), 300);
  assert_eq!(c.find_and_ref_scratch(&sk(11)), Some(r3));

  // Does not fit, destroyed
  // 放不下，销毁
  let r4 = c.insert(Tex(900), Budget::UnbudgetedUncacheable, sk(12));
  c.release(r4, RefKind::Usage);
  assert!(!c.contains(r4));
  c.validate();
  OK
}

#[test]
fn test_scratch_checkout() -> Void {
  let mut c = cache(10_000);
  let ids: Vec<ResId> = (0..3)
    .map(|_| c.insert(Tex(100), Budget::Budgeted, sk(20)))
    .collect();
  for &id in &ids {
    c.release(id, RefKind::Usage);
  }

  let mut got = Vec::new();
  for _ in 0..3 {
    got.push(c.find_and_ref_scratch(&sk(20)).unwrap());
  }
  assert_eq!(got.iter().collect::<HashSet<_>>().len(), 3);
  assert!(c.find_and_ref_scratch(&sk(20)).is_none());
  assert!(c.find_and_ref_scratch(&sk(21)).is_none());

  c.release(got[1], RefKind::Usage);
  assert_eq!(c.find_and_ref_scratch(&sk(20)), Some(got[1]));
  c.validate();
  OK
}

#[test]
fn test_command_buffer_refs() -> Void {
  let mut c = cache(10_000);
  let r = c.insert(Tex(100), Budget::Budgeted, sk(30));
  assert!(c.add_ref(r, RefKind::CommandBuffer));
  c.release(r, RefKind::Usage);

  // GPU work pending: not purgeable, still reusable as scratch
  // GPU 工作未完成：不可清理，但仍可作为临时资源复用
  assert!(!c.is_purgeable(r));
  assert_eq!(c.find_and_ref_scratch(&sk(30)), Some(r));
  c.release(r, RefKind::Usage);
  assert!(!c.is_purgeable(r));

  c.release(r, RefKind::CommandBuffer);
  assert!(c.is_purgeable(r));
  assert_eq!(c.refs(r, RefKind::CommandBuffer), 0);
  c.validate();
  OK
}

#[test]
fn test_unique_precedence() -> Void {
  let mut c = cache(10_000);
  let r1 = c.insert(Tex(10), Budget::Budgeted, sk(40));
  let r2 = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r1, uk(40));
  assert_eq!(c.unique_key(r1), Some(&uk(40)));

  c.set_unique_key(r2, uk(40));
  assert_eq!(c.unique_key(r1), None);
  assert_eq!(c.find_unique(&uk(40)), Some(r2));
  c.release(r2, RefKind::Usage);
  c.release(r2, RefKind::Usage);
  assert!(c.is_purgeable(r2));

  // r1 kept its scratch key and is checked in once idle
  // r1 保留临时键，空闲后进入临时键表
  c.release(r1, RefKind::Usage);
  assert_eq!(c.find_and_ref_scratch(&sk(40)), Some(r1));

  // Idle holder without scratch key is destroyed on takeover
  // 无临时键的空闲持有者在被接管时销毁
  let r3 = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r3, uk(40));
  assert!(!c.contains(r2));
  assert!(c.has_unique(&uk(40)));

  // Invalid key removes
  // 无效键即移除
  c.set_unique_key(r3, UniqueKey::default());
  assert!(!c.has_unique(&uk(40)));
  c.validate();
  OK
}

#[test]
fn test_unique_takeover_rechecks_idle_holder() -> Void {
  info!("> idle holder losing its unique key goes through release again");
  let mut c = cache(10_000);
  let a = c.insert(Tex(100), Budget::UnbudgetedCacheable, sk(195));
  c.set_unique_key(a, uk(195));
  c.release(a, RefKind::Usage);
  assert!(c.is_purgeable(a));
  assert_eq!(c.budgeted_bytes(), 0);

  let b = c.insert(Tex(100), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(b, uk(195));
  c.purge_as_needed();

  // Adopted into the budget as plain scratch
  // 作为普通临时资源纳入预算
  assert_eq!(c.budget(a), Some(Budget::Budgeted));
  assert_eq!(c.unique_key(a), None);
  assert_eq!(c.stats().unbudgeted_cacheable_bytes, 0);
  assert_eq!(c.budgeted_bytes(), 200);
  assert_eq!(c.find_and_ref_scratch(&sk(195)), Some(a));
  assert_eq!(c.find_unique(&uk(195)), Some(b));
  c.validate();

  // No room in the budget: destroyed
  // 预算放不下：销毁
  let mut c = cache(150);
  let a = c.insert(Tex(100), Budget::UnbudgetedCacheable, sk(196));
  c.set_unique_key(a, uk(196));
  c.release(a, RefKind::Usage);
  let b = c.insert(Tex(100), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(b, uk(196));
  assert!(!c.contains(a));
  assert_eq!(c.count(), 1);
  c.validate();
  OK
}

#[test]
fn test_remove_unique_key() -> Void {
  info!("> remove_unique_key on referenced and idle holders");
  let (mut c, freed) = tracked(10_000);

  // Referenced holder is checked in once idle
  // 被引用的持有者空闲后进入临时键表
  let a = c.insert(Tex(100), Budget::Budgeted, sk(190));
  c.set_unique_key(a, uk(190));
  c.remove_unique_key(a);
  assert!(!c.has_unique(&uk(190)));
  assert_eq!(c.find_and_ref_scratch(&sk(190)), None);
  c.release(a, RefKind::Usage);
  assert_eq!(c.find_and_ref_scratch(&sk(190)), Some(a));
  c.release(a, RefKind::Usage);

  // Idle holder with scratch key re-enters the scratch map at once
  // 带临时键的空闲持有者立即回到临时键表
  let b = c.insert(Tex(100), Budget::Budgeted, sk(191));
  c.set_unique_key(b, uk(191));
  c.release(b, RefKind::Usage);
  assert_eq!(c.stats().scratch, 1);
  c.remove_unique_key(b);
  assert!(c.is_purgeable(b));
  assert_eq!(c.stats().scratch, 2);
  assert_eq!(c.find_and_ref_scratch(&sk(191)), Some(b));
  c.release(b, RefKind::Usage);

  // Idle budgeted holder left without keys is destroyed
  // 失去所有键的空闲预算内资源被销毁
  let d = c.insert(Tex(100), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(d, uk(192));
  c.release(d, RefKind::Usage);
  assert!(c.is_purgeable(d));
  c.remove_unique_key(d);
  assert!(!c.contains(d));
  assert_eq!(freed.borrow().as_slice(), &[d]);
  assert_eq!(c.budgeted_bytes(), 200);
  c.validate();
  OK
}

#[test]
fn test_unique_custom_data_refresh() -> Void {
  let mut c = cache(10_000);
  let r = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r, uk(45));
  let mut k = uk(45);
  k.set_custom_data(Some(Arc::from(&b"v2"[..])));
  c.set_unique_key(r, k);
  let data = c.unique_key(r).and_then(|k| k.custom_data().cloned());
  assert_eq!(data.as_deref(), Some(&b"v2"[..]));
  assert_eq!(c.count_tagged("tex"), 1);
  assert_eq!(c.count_tagged("other"), 0);
  OK
}

#[test]
fn test_invalidation_message() -> Void {
  info!("> invalidation routed by cache id");
  let mut c = cache(10_000);
  let mut other = cache(10_000);

  let r = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r, uk(50));
  c.release(r, RefKind::Usage);
  let o = other.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  other.set_unique_key(o, uk(50));

  assert_eq!(UniqueKeyInvalidated::new(uk(50), c.id()).post(), 1);
  other.purge_as_needed();
  assert!(other.has_unique(&uk(50)));

  c.purge_as_needed();
  assert!(!c.has_unique(&uk(50)));
  assert!(!c.contains(r));

  // Referenced holder only loses the key
  // 被引用的持有者只失去键
  UniqueKeyInvalidated::new(uk(50), other.id()).post();
  other.purge_as_needed();
  assert!(!other.has_unique(&uk(50)));
  assert!(other.contains(o));
  OK
}

#[test]
fn test_res_ref_across_threads() -> Void {
  let mut c = cache(10_000);
  let r = c.insert(Tex(10), Budget::Budgeted, sk(60));
  let shared = c.share(r).unwrap();
  c.release(r, RefKind::Usage);
  assert!(!c.is_purgeable(r));

  thread::spawn(move || drop(shared)).join().unwrap();
  assert!(!c.is_purgeable(r));
  c.process_returned();
  assert!(c.is_purgeable(r));

  // Stale id after destruction is ignored
  // 销毁后的旧 id 被忽略
  let shared = c.share(r).unwrap();
  c.release_all();
  drop(shared);
  c.process_returned();
  assert!(c.share(r).is_none());
  OK
}

#[test]
fn test_timestamp_wrap_keeps_order() -> Void {
  info!("> timestamp wraparound");
  let mut c = cache(10_000);
  let r0 = c.insert(Tex(10), Budget::Budgeted, sk(70));
  let r1 = c.insert(Tex(10), Budget::Budgeted, sk(70));
  let r2 = c.insert(Tex(10), Budget::Budgeted, sk(70));
  c.release(r2, RefKind::Usage);

  c.set_next_ts(u32::MAX);
  c.add_ref(r0, RefKind::Usage);
  assert_eq!(c.timestamp(r0), Some(u32::MAX));

  c.add_ref(r1, RefKind::Usage);
  let (t0, t1, t2) = (
    c.timestamp(r0).unwrap(),
    c.timestamp(r1).unwrap(),
    c.timestamp(r2).unwrap(),
  );
  assert!(t2 < t0);
  assert_eq!(t1 as usize, c.count());
  assert!(t0 < t1);
  c.validate();
  OK
}

#[test]
fn test_budget_convergence() -> Void {
  let mut c = cache(1000);
  for i in 0..10 {
    let r = c.insert(Tex(300), Budget::Budgeted, sk(80 + i));
    c.release(r, RefKind::Usage);
    assert!(c.budgeted_bytes() <= 1000);
  }
  c.set_limit(500);
  assert!(c.budgeted_bytes() <= 500);
  assert_eq!(c.max_bytes(), 500);

  let s = c.stats();
  assert_eq!(s.high_bytes, 1200);
  assert_eq!(s.high_count, 4);
  c.validate();
  OK
}

#[test]
fn test_purge_to_headroom() -> Void {
  let mut c = cache(1000);
  let ids: Vec<ResId> = (0..3)
    .map(|i| c.insert(Tex(300), Budget::Budgeted, sk(90 + i)))
    .collect();
  for &id in &ids {
    c.release(id, RefKind::Usage);
  }

  assert_eq!(
    c.purge_to_headroom(2000),
    Err(Error::HeadroomTooLarge {
      want: 2000,
      max: 1000
    })
  );
  c.purge_to_headroom(100)?;
  assert_eq!(c.count(), 3);

  c.purge_to_headroom(500)?;
  assert_eq!(c.count(), 1);
  assert!(c.contains(ids[2]));

  let mut c = cache(1000);
  let held = c.insert(Tex(800), Budget::Budgeted, sk(95));
  assert_eq!(
    c.purge_to_headroom(500),
    Err(Error::NotEnoughPurgeable {
      want: 500,
      avail: 200
    })
  );
  assert!(c.contains(held));
  OK
}

#[test]
fn test_purge_unlocked() -> Void {
  let mut c = cache(10_000);
  let s = c.insert(Tex(10), Budget::Budgeted, sk(100));
  let u = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(u, uk(100));
  let held = c.insert(Tex(10), Budget::Budgeted, sk(101));

  let before = Instant::now();
  c.release(s, RefKind::Usage);
  c.release(u, RefKind::Usage);

  assert_eq!(c.purge_unlocked(Some(before), false), 0);
  assert_eq!(c.purge_unlocked(None, true), 1);
  assert!(!c.contains(s));
  assert!(c.contains(u));

  let later = Instant::now() + Duration::from_secs(60);
  assert_eq!(c.purge_unlocked(Some(later), false), 1);
  assert!(!c.contains(u));
  assert!(c.contains(held));
  assert_eq!(c.purge_all_unlocked(), 0);
  OK
}

#[test]
fn test_purge_bytes() -> Void {
  let mut c = cache(1000);
  let a = c.insert(Tex(300), Budget::Budgeted, sk(110));
  let u = c.insert(Tex(300), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(u, uk(110));
  let b = c.insert(Tex(300), Budget::Budgeted, sk(111));
  for id in [a, u, b] {
    c.release(id, RefKind::Usage);
  }

  c.purge_bytes(250, true);
  assert!(!c.contains(a));
  assert!(c.contains(u) && c.contains(b));

  c.purge_bytes(250, false);
  assert!(!c.contains(u));
  assert!(c.contains(b));
  assert_eq!(c.max_bytes(), 1000);
  c.validate();
  OK
}

#[test]
fn test_set_budgeted() -> Void {
  let mut c = cache(1000);
  let r = c.insert(Tex(200), Budget::Budgeted, sk(120));
  c.set_budgeted(r, false);
  assert_eq!(c.budgeted_bytes(), 0);
  assert_eq!(c.bytes(), 200);
  assert_eq!(c.budget(r), Some(Budget::UnbudgetedUncacheable));
  c.set_budgeted(r, true);
  assert_eq!(c.budgeted_bytes(), 200);
  assert_eq!(c.budgeted_count(), 1);
  c.validate();
  OK
}

#[test]
fn test_secondary_trimmed_when_over_budget() -> Void {
  info!("> secondary cache releases views under pressure");
  let mut c = cache(1000);
  let ts = Arc::new(ThreadSafeCache::<ResRef>::new());
  c.set_secondary(ts.clone());

  let r = c.insert(Tex(500), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r, uk(130));
  ts.add(uk(130), Arc::new(c.share(r).unwrap()));
  c.release(r, RefKind::Usage);
  assert!(!c.is_purgeable(r));

  let big = c.insert(Tex(600), Budget::Budgeted, sk(130));
  assert!(ts.is_empty());
  assert!(!c.contains(r));
  assert!(c.contains(big));
  assert_eq!(c.budgeted_bytes(), 600);
  c.validate();
  OK
}

#[test]
fn test_secondary_trim_stops_at_budget() -> Void {
  info!("> secondary cache releases only what the budget needs");
  let mut c = cache(1000);
  let ts = Arc::new(ThreadSafeCache::<ResRef>::new());
  c.set_secondary(ts.clone());

  let mut li = Vec::new();
  for i in 0..3 {
    let r = c.insert(Tex(300), Budget::Budgeted, ScratchKey::default());
    c.set_unique_key(r, uk(180 + i));
    ts.add(uk(180 + i), Arc::new(c.share(r).unwrap()));
    c.release(r, RefKind::Usage);
    li.push(r);
  }
  assert_eq!(c.budgeted_bytes(), 900);

  let held = c.insert(Tex(200), Budget::Budgeted, sk(180));
  assert_eq!(ts.len(), 2);
  assert!(ts.find(&uk(180)).is_none());
  assert!(!c.contains(li[0]));
  assert!(c.contains(li[1]));
  assert!(c.contains(li[2]));
  assert!(c.contains(held));
  assert_eq!(c.count(), 3);
  assert_eq!(c.budgeted_bytes(), 800);
  c.validate();
  OK
}

#[test]
fn test_secondary_invalidation_and_release_all() -> Void {
  let (mut c, freed) = tracked(10_000);
  let ts = Arc::new(ThreadSafeCache::<ResRef>::new());
  c.set_secondary(ts.clone());

  let r = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r, uk(140));
  ts.add(uk(140), Arc::new(c.share(r).unwrap()));
  c.release(r, RefKind::Usage);

  UniqueKeyInvalidated::ts_cache(uk(140), c.id()).post();
  c.purge_as_needed();
  assert!(ts.is_empty());
  assert!(c.is_purgeable(r));

  let held = c.insert(Tex(10), Budget::Budgeted, sk(141));
  ts.add(uk(141), Arc::new(c.share(held).unwrap()));
  c.release_all();
  assert!(ts.is_empty());
  assert_eq!(c.count(), 0);
  assert_eq!(c.bytes(), 0);
  assert_eq!(freed.borrow().len(), 2);
  OK
}

#[test]
fn test_purge_unlocked_trims_secondary() -> Void {
  let mut c = cache(10_000);
  let ts = Arc::new(ThreadSafeCache::<ResRef>::new());
  c.set_secondary(ts.clone());
  let r = c.insert(Tex(10), Budget::Budgeted, ScratchKey::default());
  c.set_unique_key(r, uk(150));
  ts.add(uk(150), Arc::new(c.share(r).unwrap()));
  c.release(r, RefKind::Usage);

  assert_eq!(c.purge_all_unlocked(), 1);
  assert!(ts.is_empty());
  assert!(c.is_empty());
  OK
}

#[test]
fn test_racing_publishers_share_one_view() -> Void {
  info!("> threads racing find_or_add on one key");
  let mut c = cache(10_000);
  let ts = Arc::new(ThreadSafeCache::<ResRef>::new());
  c.set_secondary(ts.clone());

  // One candidate per thread, made on the owner thread
  // 每个线程一个候选，在拥有者线程创建
  let mut candidates = Vec::new();
  for _ in 0..4 {
    let r = c.insert(Tex(10), Budget::Budgeted, sk(160));
    candidates.push(c.share(r).unwrap());
    c.release(r, RefKind::Usage);
  }

  let barrier = Arc::new(Barrier::new(4));
  let handles: Vec<_> = candidates
    .into_iter()
    .map(|view| {
      let ts = ts.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        ts.find_or_add(&uk(160), move || view).id()
      })
    })
    .collect();
  let won: Vec<ResId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
  assert!(won.iter().all(|id| *id == won[0]));
  assert_eq!(ts.len(), 1);

  // Losers were returned and are idle scratch again
  // 落败者已归还，重新成为空闲临时资源
  c.process_returned();
  assert_eq!(c.stats().scratch, 3);
  assert!(!c.is_purgeable(won[0]));
  c.validate();
  OK
}

mod props {
  use proptest::prelude::*;

  use super::*;

  #[derive(Debug, Clone)]
  enum Op {
    Insert(usize, u8, Option<u32>),
    Release(usize),
    FindScratch(u32),
    SetUnique(usize, u32),
    FindUnique(u32),
    RemoveUnique(usize),
    Invalidate(u32),
    SetLimit(usize),
    PurgeUnlocked(bool),
    Headroom(usize),
    PurgeBytes(usize, bool),
    Wrap,
  }

  fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
      4 => (0..400usize, 0..3u8, proptest::option::of(0..3u32))
        .prop_map(|(s, b, k)| Op::Insert(s, b, k)),
      4 => any::<usize>().prop_map(Op::Release),
      2 => (0..3u32).prop_map(Op::FindScratch),
      2 => (any::<usize>(), 0..4u32).prop_map(|(i, k)| Op::SetUnique(i, k)),
      2 => (0..4u32).prop_map(Op::FindUnique),
      1 => any::<usize>().prop_map(Op::RemoveUnique),
      1 => (0..4u32).prop_map(Op::Invalidate),
      1 => (0..2000usize).prop_map(Op::SetLimit),
      1 => any::<bool>().prop_map(Op::PurgeUnlocked),
      1 => (0..1500usize).prop_map(Op::Headroom),
      1 => (0..800usize, any::<bool>()).prop_map(|(b, p)| Op::PurgeBytes(b, p)),
      1 => Just(Op::Wrap),
    ]
  }

  fn budget(b: u8) -> Budget {
    match b {
      0 => Budget::Budgeted,
      1 => Budget::UnbudgetedCacheable,
      _ => Budget::UnbudgetedUncacheable,
    }
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_indexes_stay_consistent(ops in prop::collection::vec(op(), 1..120)) {
      let mut c = cache(1000);
      // One entry per usage ref this test owns
      // 本测试持有的每个使用引用对应一项
      let mut held: Vec<ResId> = Vec::new();

      for op in ops {
        match op {
          Op::Insert(size, b, k) => {
            let key = k.map_or_else(ScratchKey::default, |k| sk(1000 + k));
            held.push(c.insert(Tex(size), budget(b), key));
          }
          Op::Release(i) => {
            if !held.is_empty() {
              let id = held.swap_remove(i % held.len());
              c.release(id, RefKind::Usage);
            }
          }
          Op::FindScratch(k) => {
            if let Some(id) = c.find_and_ref_scratch(&sk(1000 + k)) {
              held.push(id);
            }
          }
          Op::SetUnique(i, k) => {
            if !held.is_empty() {
              c.set_unique_key(held[i % held.len()], uk(1000 + k));
            }
          }
          Op::FindUnique(k) => {
            if let Some(id) = c.find_unique(&uk(1000 + k)) {
              held.push(id);
            }
          }
          Op::RemoveUnique(i) => {
            if !held.is_empty() {
              c.remove_unique_key(held[i % held.len()]);
            }
          }
          Op::Invalidate(k) => {
            UniqueKeyInvalidated::new(uk(1000 + k), c.id()).post();
          }
          Op::SetLimit(max) => c.set_limit(max),
          Op::PurgeUnlocked(scratch_only) => {
            c.purge_unlocked(None, scratch_only);
          }
          Op::Headroom(bytes) => {
            let _ = c.purge_to_headroom(bytes);
          }
          Op::PurgeBytes(bytes, prefer) => c.purge_bytes(bytes, prefer),
          Op::Wrap => c.set_next_ts(u32::MAX - 1),
        }
        c.validate();

        for id in &held {
          prop_assert!(c.contains(*id));
          prop_assert!(!c.is_purgeable(*id));
        }

        c.purge_as_needed();
        prop_assert!(!c.over_budget() || c.top_of_purgeable().is_none());
        c.validate();
      }
    }
  }
}
