// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 控制器配置 - 通过JSON文件调整参数

use crate::detection::LandmarkLayout;
use crate::error::{ControllerError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 控制器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    // === 会话参数 ===
    pub sensitivity: f32,        // 灵敏度 (越大越容易触发)
    pub mirror_horizontal: bool, // 水平镜像 (前置摄像头)
    pub layout: LandmarkLayout,  // 关键点索引布局

    // === 标定参数 ===
    pub calibration_max_samples: usize,     // 最多采样数
    pub calibration_min_samples: usize,     // 最少有效样本
    pub calibration_window_ms: u64,         // 标定时间窗
    pub calibration_sample_interval_ms: u64, // 采样间隔 (让出调度)
    pub min_shoulder_width: f32,            // 肩宽数值噪声下限

    // === 分类参数 ===
    pub threshold_scale: f32,     // k: 阈值 = k / max(灵敏度, 下限) * 肩宽
    pub min_sensitivity: f32,     // 灵敏度下限
    pub smoothing_alpha: f32,     // 指数平滑新样本权重
    pub drift_beta: f32,          // 基线漂移融合系数
    pub neutral_gate_x: f32,      // 中立判定 (水平, 相对阈值)
    pub neutral_gate_y: f32,      // 中立判定 (垂直, 相对阈值)
    pub horizontal_factor: f32,   // 左右阈值系数
    pub down_factor: f32,         // 低头阈值系数
    pub up_factor: f32,           // 抬头阈值系数
    pub dominance_ratio: f32,     // 主轴优势比
    pub confidence_span: f32,     // 置信度归一化跨度

    // === 去抖参数 ===
    pub high_confidence: f32,     // 单帧即触发的置信度
    pub repeat_gap_ms: u64,       // 同方向最小间隔
    pub change_gap_ms: u64,       // 换方向最小间隔
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // 会话
            sensitivity: 1.0,
            mirror_horizontal: false,
            layout: LandmarkLayout::MediaPipe33,

            // 标定
            calibration_max_samples: 12,
            calibration_min_samples: 6,
            calibration_window_ms: 1800,
            calibration_sample_interval_ms: 16,
            min_shoulder_width: 1e-4,

            // 分类
            threshold_scale: 0.09,
            min_sensitivity: 0.4,
            smoothing_alpha: 0.45,
            drift_beta: 0.035,
            neutral_gate_x: 0.65,
            neutral_gate_y: 0.75,
            horizontal_factor: 0.95,
            down_factor: 1.05,
            up_factor: 1.35,
            dominance_ratio: 1.12,
            confidence_span: 2.1,

            // 去抖
            high_confidence: 0.72,
            repeat_gap_ms: 220,
            change_gap_ms: 90,
        }
    }
}

impl ControllerConfig {
    /// 默认配置文件路径: <用户配置目录>/pose-direction/controller.json
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pose-direction")
            .join("controller.json")
    }

    /// 从JSON文件加载配置
    ///
    /// 文件不存在时创建默认配置; 解析失败时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        info!("✅ 配置已从 {} 加载", path.display());
                        config
                    }
                    Err(e) => {
                        warn!("⚠️  配置无效: {}, 使用默认值", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {:#}", e);
                }
                config
            }
            Err(e) => {
                // 文件存在但无法读取: 不覆盖用户的文件
                warn!("⚠️  读取配置失败: {}: {}, 使用默认值", path.display(), e);
                Self::default()
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("创建配置目录失败: {}", dir.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, json).with_context(|| format!("写入配置失败: {}", path.display()))?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 检查参数取值范围
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sensitivity", self.sensitivity),
            ("min_sensitivity", self.min_sensitivity),
            ("threshold_scale", self.threshold_scale),
            ("min_shoulder_width", self.min_shoulder_width),
            ("horizontal_factor", self.horizontal_factor),
            ("down_factor", self.down_factor),
            ("up_factor", self.up_factor),
            ("dominance_ratio", self.dominance_ratio),
            ("confidence_span", self.confidence_span),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ControllerError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let unit = [
            ("smoothing_alpha", self.smoothing_alpha),
            ("drift_beta", self.drift_beta),
            ("high_confidence", self.high_confidence),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ControllerError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.calibration_min_samples == 0
            || self.calibration_min_samples > self.calibration_max_samples
        {
            return Err(ControllerError::Config(format!(
                "calibration samples: min {} / max {}",
                self.calibration_min_samples, self.calibration_max_samples
            )));
        }
        if self.calibration_window_ms == 0 || self.calibration_sample_interval_ms == 0 {
            return Err(ControllerError::Config(
                "calibration window and sample interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn calibration_window(&self) -> Duration {
        Duration::from_millis(self.calibration_window_ms)
    }

    pub fn calibration_sample_interval(&self) -> Duration {
        Duration::from_millis(self.calibration_sample_interval_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前控制器配置:");
        info!("  灵敏度: {:.2} | 水平镜像: {}", self.sensitivity, self.mirror_horizontal);
        info!("  关键点布局: {:?}", self.layout);
        info!(
            "  标定: {}~{} 样本 / {}ms",
            self.calibration_min_samples, self.calibration_max_samples, self.calibration_window_ms
        );
        info!(
            "  阈值系数: {:.3} | 平滑: {:.2} | 漂移: {:.3}",
            self.threshold_scale, self.smoothing_alpha, self.drift_beta
        );
        info!(
            "  去抖: 高置信 {:.2} | 同向间隔 {}ms | 换向间隔 {}ms",
            self.high_confidence, self.repeat_gap_ms, self.change_gap_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration_max_samples, 12);
        assert_eq!(config.calibration_min_samples, 6);
        assert_eq!(config.calibration_window(), Duration::from_millis(1800));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"sensitivity": 1.5, "layout": "coco17"}"#).unwrap();
        assert_eq!(config.sensitivity, 1.5);
        assert_eq!(config.layout, LandmarkLayout::Coco17);
        assert_eq!(config.repeat_gap_ms, 220);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ControllerConfig::default();
        config.sensitivity = 0.0;
        assert!(matches!(config.validate(), Err(ControllerError::Config(_))));

        let mut config = ControllerConfig::default();
        config.calibration_min_samples = 20;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::default();
        config.smoothing_alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let path = std::env::temp_dir()
            .join(format!("pose-direction-config-{}", std::process::id()))
            .join("controller.json");
        let _ = fs::remove_file(&path);

        let config = ControllerConfig::load(&path);
        assert_eq!(config, ControllerConfig::default());
        assert!(path.exists());

        let mut tuned = config.clone();
        tuned.sensitivity = 1.3;
        tuned.save(&path).unwrap();
        assert_eq!(ControllerConfig::load(&path).sensitivity, 1.3);

        fs::write(&path, "{ broken").unwrap();
        assert_eq!(ControllerConfig::load(&path), ControllerConfig::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_keeps_unreadable_file() {
        let path = std::env::temp_dir()
            .join(format!("pose-direction-config-utf8-{}", std::process::id()))
            .join("controller.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let bytes = [b'{', 0xff, 0xfe, b'}'];
        fs::write(&path, bytes).unwrap();

        assert_eq!(ControllerConfig::load(&path), ControllerConfig::default());
        assert_eq!(fs::read(&path).unwrap(), bytes);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
