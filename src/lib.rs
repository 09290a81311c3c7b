// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

pub mod config; // 控制器配置参数
pub mod controller; // 标定 + 分类 + 去抖
pub mod detection; // 关键点与姿态来源
pub mod error;
pub mod game; // 方向消费者接口
pub mod utils;

pub use crate::config::ControllerConfig;
pub use crate::controller::{Baseline, DiagnosticSnapshot, MotionController, Subscription};
pub use crate::detection::{
    Direction, DirectionEvent, LandmarkLayout, LandmarkSet, LandmarkSnapshot, Point2, PoseSource,
};
pub use crate::error::{ControllerError, Result};
pub use crate::game::{DirectionSink, Heading};
pub use crate::utils::{Clock, ManualClock, MonotonicClock};

/// 会话时间串 (本地时区),用于输出文件命名
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
