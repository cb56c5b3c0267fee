use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("headroom {want} exceeds budget {max} / 预留空间超出预算")]
  HeadroomTooLarge { want: usize, max: usize },

  #[error("purgeable resources cannot free {want} bytes, at most {avail} / 可清理资源不足")]
  NotEnoughPurgeable { want: usize, avail: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
