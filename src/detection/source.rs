// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 姿态来源 (Pose source)
//!
//! 关键点检测器本身是外部协作者: 控制器只需要 "给定时间戳 → 零或一组关键点"。

use super::types::{LandmarkSet, Point2};
use crate::error::{ControllerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 姿态检测协作者接口
pub trait PoseSource {
    /// 打开采集设备并初始化检测器
    ///
    /// 采集失败返回 `CameraUnavailable`,检测器构建失败返回 `ModelInitFailed`
    fn open(&mut self) -> Result<()>;

    /// 检测当前帧; 画面中无人时返回 None
    fn detect(&mut self, timestamp: Duration) -> Option<LandmarkSet>;

    /// 释放设备
    fn close(&mut self) {}
}

impl<S: PoseSource + ?Sized> PoseSource for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn detect(&mut self, timestamp: Duration) -> Option<LandmarkSet> {
        (**self).detect(timestamp)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// 录制文件中的一行 (JSON lines)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub t_ms: Option<u64>,
    /// 每个索引一个 [x, y],缺失的点为 null; 整帧无人为 null
    pub landmarks: Option<Vec<Option<[f32; 2]>>>,
}

impl ReplayFrame {
    pub fn to_landmarks(&self) -> Option<LandmarkSet> {
        self.landmarks.as_ref().map(|points| {
            LandmarkSet::new(
                points
                    .iter()
                    .map(|p| p.map(|[x, y]| Point2::new(x, y)))
                    .collect(),
            )
        })
    }

    pub fn from_landmarks(t_ms: u64, set: Option<&LandmarkSet>) -> Self {
        Self {
            t_ms: Some(t_ms),
            landmarks: set.map(|s| {
                (0..s.len())
                    .map(|i| s.get(i).map(|p| [p.x(), p.y()]))
                    .collect()
            }),
        }
    }
}

/// 录制回放来源: 每次 detect 依次返回一帧
pub struct ReplaySource {
    path: Option<PathBuf>,
    frames: Vec<Option<LandmarkSet>>,
    cursor: usize,
    looping: bool,
}

impl ReplaySource {
    /// 从 JSON lines 文件回放 (open 时读取)
    pub fn from_file(path: impl AsRef<Path>, looping: bool) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            frames: Vec::new(),
            cursor: 0,
            looping,
        }
    }

    /// 从内存帧序列回放
    pub fn from_frames(frames: Vec<Option<LandmarkSet>>, looping: bool) -> Self {
        Self {
            path: None,
            frames,
            cursor: 0,
            looping,
        }
    }

    pub fn parse(text: &str) -> Result<Vec<Option<LandmarkSet>>> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<ReplayFrame>(line)
                    .map(|frame| frame.to_landmarks())
                    .map_err(|e| ControllerError::Replay(format!("line {}: {}", n + 1, e)))
            })
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl PoseSource for ReplaySource {
    fn open(&mut self) -> Result<()> {
        self.cursor = 0;
        let Some(path) = &self.path else {
            return Ok(());
        };

        let text = fs::read_to_string(path).map_err(|e| {
            ControllerError::CameraUnavailable(format!("{}: {}", path.display(), e))
        })?;
        // 录制文件损坏等同于检测器无法构建
        self.frames = Self::parse(&text).map_err(|e| match e {
            ControllerError::Replay(msg) => {
                ControllerError::ModelInitFailed(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!("📼 回放文件已加载: {} ({} 帧)", path.display(), self.frames.len());
        if self.frames.is_empty() {
            warn!("⚠️  回放文件为空: {}", path.display());
        }
        Ok(())
    }

    fn detect(&mut self, _timestamp: Duration) -> Option<LandmarkSet> {
        if self.frames.is_empty() {
            return None;
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        frame
    }
}
