// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 合成姿态来源 (Synthetic pose source)
//!
//! 按脚本生成 "坐正 / 偏头" 的关键点,叠加随机抖动和掉帧,用于演示与鲁棒性测试。

use super::source::PoseSource;
use super::types::{Direction, LandmarkLayout, LandmarkSet, Point2};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::info;

/// 脚本片段: 持续时间内保持某个偏头方向 (None 为中立姿态)
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub duration: Duration,
    pub lean: Option<Direction>,
}

impl Segment {
    pub fn new(duration_ms: u64, lean: Option<Direction>) -> Self {
        Self {
            duration: Duration::from_millis(duration_ms),
            lean,
        }
    }
}

pub struct SyntheticSource {
    layout: LandmarkLayout,
    script: Vec<Segment>,
    rng: StdRng,
    jitter: f32,        // 每个坐标的均匀抖动幅度
    dropout: f64,       // 掉帧概率
    lean_amount: f32,   // 偏头时鼻子位移
    shoulder_width: f32,
}

impl SyntheticSource {
    pub fn new(layout: LandmarkLayout, script: Vec<Segment>, seed: u64) -> Self {
        Self {
            layout,
            script,
            rng: StdRng::seed_from_u64(seed),
            jitter: 0.002,
            dropout: 0.0,
            lean_amount: 0.05,
            shoulder_width: 0.2,
        }
    }

    /// 默认演示脚本: 坐正 2 秒后依次 右/左/下/上,每次回正
    pub fn demo(layout: LandmarkLayout, seed: u64) -> Self {
        let mut script = vec![Segment::new(2500, None)];
        for dir in [Direction::Right, Direction::Left, Direction::Down, Direction::Up] {
            script.push(Segment::new(600, Some(dir)));
            script.push(Segment::new(900, None));
        }
        Self::new(layout, script, seed)
    }

    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout.clamp(0.0, 1.0);
        self
    }

    pub fn with_lean_amount(mut self, amount: f32) -> Self {
        self.lean_amount = amount;
        self
    }

    pub fn with_shoulder_width(mut self, width: f32) -> Self {
        self.shoulder_width = width;
        self
    }

    /// 时间戳所在的脚本片段 (循环播放)
    fn lean_at(&self, timestamp: Duration) -> Option<Direction> {
        let total: Duration = self.script.iter().map(|s| s.duration).sum();
        if total.is_zero() {
            return None;
        }
        let mut t = Duration::from_nanos((timestamp.as_nanos() % total.as_nanos()) as u64);
        for segment in &self.script {
            if t < segment.duration {
                return segment.lean;
            }
            t -= segment.duration;
        }
        None
    }

    fn noise(&mut self) -> f32 {
        if self.jitter <= 0.0 {
            0.0
        } else {
            self.rng.gen_range(-self.jitter..=self.jitter)
        }
    }
}

impl PoseSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        info!(
            "🧪 合成姿态来源: {} 个片段, 抖动 {:.4}, 掉帧率 {:.2}",
            self.script.len(),
            self.jitter,
            self.dropout
        );
        Ok(())
    }

    fn detect(&mut self, timestamp: Duration) -> Option<LandmarkSet> {
        if self.dropout > 0.0 && self.rng.gen_bool(self.dropout) {
            return None;
        }

        let (dx, dy) = match self.lean_at(timestamp) {
            Some(Direction::Right) => (self.lean_amount, 0.0),
            Some(Direction::Left) => (-self.lean_amount, 0.0),
            Some(Direction::Down) => (0.0, self.lean_amount),
            Some(Direction::Up) => (0.0, -self.lean_amount * 1.4),
            None => (0.0, 0.0),
        };

        let half = self.shoulder_width / 2.0;
        let nose = Point2::new(0.5 + dx + self.noise(), 0.35 + dy + self.noise());
        let left = Point2::new(0.5 - half + self.noise(), 0.55 + self.noise());
        let right = Point2::new(0.5 + half + self.noise(), 0.55 + self.noise());
        Some(LandmarkSet::from_core(self.layout, nose, left, right))
    }
}
