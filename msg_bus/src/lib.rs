//! Routed broadcast mailbox
//!
//! Any thread may `post`; each message is delivered to every inbox whose id
//! equals `dest()`. Owners drain their inbox with `poll` at a time of their
//! choosing.
//!
//! 按 id 路由的广播信箱
//!
//! 任意线程可 `post`，消息投递到 id 等于 `dest()` 的每个收件箱。
//! 拥有者在合适时机用 `poll` 取出。

#![cfg_attr(docsrs, feature(doc_cfg))]

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
  mpsc::{Receiver, Sender, channel},
};

use parking_lot::Mutex;

/// Message with a destination inbox id
/// 带目标收件箱 id 的消息
pub trait Routed: Clone + Send + 'static {
  fn dest(&self) -> u32;
}

struct Slot<M> {
  id: u32,
  token: u64,
  tx: Sender<M>,
}

struct Shared<M> {
  slots: Mutex<Vec<Slot<M>>>,
  token: AtomicU64,
}

/// Broadcast bus, cheap to clone
/// 广播总线，克隆开销低
pub struct Bus<M> {
  shared: Arc<Shared<M>>,
}

impl<M> Clone for Bus<M> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<M: Routed> Default for Bus<M> {
  fn default() -> Self {
    Self::new()
  }
}

impl<M: Routed> Bus<M> {
  pub fn new() -> Self {
    Self {
      shared: Arc::new(Shared {
        slots: Mutex::new(Vec::new()),
        token: AtomicU64::new(0),
      }),
    }
  }

  /// Register an inbox for `id`, unregistered on drop
  /// 为 `id` 注册收件箱，drop 时注销
  pub fn inbox(&self, id: u32) -> Inbox<M> {
    let (tx, rx) = channel();
    let token = self.shared.token.fetch_add(1, Ordering::Relaxed);
    self.shared.slots.lock().push(Slot { id, token, tx });
    Inbox {
      id,
      token,
      rx,
      shared: self.shared.clone(),
    }
  }

  /// Deliver to every matching inbox, returns delivery count
  /// 投递到所有匹配的收件箱，返回投递数
  pub fn post(&self, msg: M) -> usize {
    let dest = msg.dest();
    let slots = self.shared.slots.lock();
    let mut n = 0;
    for slot in slots.iter().filter(|s| s.id == dest) {
      if slot.tx.send(msg.clone()).is_ok() {
        n += 1;
      }
    }
    if n == 0 {
      log::trace!("bus: no inbox for {dest}");
    }
    n
  }
}

/// Receiving end owned by one consumer
/// 单个消费者持有的接收端
pub struct Inbox<M> {
  id: u32,
  token: u64,
  rx: Receiver<M>,
  shared: Arc<Shared<M>>,
}

impl<M> Inbox<M> {
  #[inline]
  pub fn id(&self) -> u32 {
    self.id
  }

  /// Drain pending messages without blocking
  /// 非阻塞取出全部待处理消息
  pub fn poll(&self) -> Vec<M> {
    self.rx.try_iter().collect()
  }
}

impl<M> Drop for Inbox<M> {
  fn drop(&mut self) {
    let token = self.token;
    self.shared.slots.lock().retain(|s| s.token != token);
  }
}
