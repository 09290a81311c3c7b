// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测输入系统 (Detection Input)
///
/// 关键点数据结构与姿态来源
/// - types:     关键点 / 方向 / 事件
/// - source:    PoseSource 协作者接口 + 录制回放
/// - synthetic: 合成姿态 (演示与测试)
pub mod source;
pub mod synthetic;
pub mod types;

pub use source::{PoseSource, ReplayFrame, ReplaySource};
pub use synthetic::{Segment, SyntheticSource};
pub use types::{
    Direction, DirectionEvent, LandmarkLayout, LandmarkSet, LandmarkSnapshot, Point2,
};
