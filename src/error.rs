// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 控制器错误类型 (Controller errors)
//!
//! 所有错误都不是致命的: 出错后控制器处于已停止或未标定状态,调用方可以直接重试。

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// 采集设备打开失败
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// 姿态检测器无法从任何配置源构建
    #[error("pose model init failed: {0}")]
    ModelInitFailed(String),

    /// 标定时间窗内有效样本不足
    #[error("calibration failed: {collected} valid samples, {required} required")]
    CalibrationFailed { collected: usize, required: usize },

    /// 调用顺序错误 (未 start 就 calibrate)
    #[error("controller not started")]
    NotStarted,

    #[error("invalid config: {0}")]
    Config(String),

    #[error("replay error: {0}")]
    Replay(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
