// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 工具模块
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};
