//! Single-owner guard
//! 单一拥有者守卫
//!
//! Debug builds track the owning thread and panic on entry from another
//! thread while a call is in progress. Release builds compile to nothing.
//! 调试构建记录拥有线程，调用进行中被其他线程进入时 panic。
//! 发布构建中为空操作。

#[cfg(debug_assertions)]
mod imp {
  use std::{
    sync::Arc,
    thread::{self, ThreadId},
  };

  use parking_lot::Mutex;

  // (owner, depth)
  type State = Arc<Mutex<(Option<ThreadId>, u32)>>;

  #[derive(Default)]
  pub struct SingleOwner(State);

  pub struct Guard(State);

  impl SingleOwner {
    pub fn enter(&self) -> Guard {
      let me = thread::current().id();
      {
        let mut s = self.0.lock();
        match s.0 {
          Some(owner) if owner != me => {
            panic!("resource cache entered from {me:?} while owned by {owner:?}")
          }
          _ => {
            s.0 = Some(me);
            s.1 += 1;
          }
        }
      }
      Guard(self.0.clone())
    }
  }

  impl Drop for Guard {
    fn drop(&mut self) {
      let mut s = self.0.lock();
      s.1 -= 1;
      if s.1 == 0 {
        s.0 = None;
      }
    }
  }
}

#[cfg(not(debug_assertions))]
mod imp {
  #[derive(Default)]
  pub struct SingleOwner;

  pub struct Guard;

  impl SingleOwner {
    #[inline(always)]
    pub fn enter(&self) -> Guard {
      Guard
    }
  }
}

pub(crate) use imp::SingleOwner;
