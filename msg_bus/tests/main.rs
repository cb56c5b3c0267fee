use std::thread;

use aok::{OK, Void};
use log::info;
use msg_bus::{Bus, Routed};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[derive(Clone, Debug, PartialEq)]
struct Msg {
  to: u32,
  v: u32,
}

impl Routed for Msg {
  fn dest(&self) -> u32 {
    self.to
  }
}

#[test]
fn test_route_by_id() -> Void {
  info!("> route by id");
  let bus = Bus::<Msg>::new();
  let a = bus.inbox(1);
  let b = bus.inbox(2);

  assert_eq!(bus.post(Msg { to: 1, v: 10 }), 1);
  assert_eq!(bus.post(Msg { to: 2, v: 20 }), 1);
  assert_eq!(bus.post(Msg { to: 3, v: 30 }), 0);

  assert_eq!(a.poll(), vec![Msg { to: 1, v: 10 }]);
  assert_eq!(b.poll(), vec![Msg { to: 2, v: 20 }]);
  assert!(a.poll().is_empty());
  OK
}

#[test]
fn test_same_id_fanout() -> Void {
  let bus = Bus::<Msg>::new();
  let a = bus.inbox(7);
  let b = bus.inbox(7);
  assert_eq!(bus.post(Msg { to: 7, v: 1 }), 2);
  assert_eq!(a.poll().len(), 1);
  assert_eq!(b.poll().len(), 1);
  OK
}

#[test]
fn test_drop_unregisters() -> Void {
  let bus = Bus::<Msg>::new();
  let a = bus.inbox(5);
  drop(a);
  assert_eq!(bus.post(Msg { to: 5, v: 1 }), 0);
  OK
}

#[test]
fn test_post_from_threads() -> Void {
  let bus = Bus::<Msg>::new();
  let inbox = bus.inbox(9);
  let handles: Vec<_> = (0..4)
    .map(|t| {
      let bus = bus.clone();
      thread::spawn(move || {
        for i in 0..25 {
          bus.post(Msg { to: 9, v: t * 100 + i });
        }
      })
    })
    .collect();
  for h in handles {
    h.join().unwrap();
  }
  let got = inbox.poll();
  assert_eq!(got.len(), 100);
  OK
}
