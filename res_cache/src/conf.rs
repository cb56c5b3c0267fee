//! Resource cache configuration
//! 资源缓存配置

/// Cache configuration options
/// 缓存配置选项
#[derive(Debug, Clone, Copy)]
pub enum Conf {
  /// Byte budget for budgeted resources
  /// 预算内资源的字节上限
  MaxBytes(usize),
}

#[derive(Debug, Clone)]
pub struct Config {
  pub max_bytes: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      max_bytes: default::MAX_BYTES,
    }
  }
}

impl From<&[Conf]> for Config {
  fn from(conf_li: &[Conf]) -> Self {
    let mut config = Self::default();
    for &conf in conf_li {
      match conf {
        Conf::MaxBytes(v) => {
          if v == 0 {
            log::warn!("MaxBytes 0: every released resource will be purged");
          }
          config.max_bytes = v;
        }
      }
    }
    config
  }
}

/// Default values
/// 默认值
pub mod default {
  pub const KB: usize = 1024;
  pub const MB: usize = 1024 * KB;

  /// 96 MiB
  pub const MAX_BYTES: usize = 96 * MB;
}
