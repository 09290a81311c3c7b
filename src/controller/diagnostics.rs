// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 诊断快照 (Diagnostics)

use crate::detection::Direction;
use serde::Serialize;
use std::time::Duration;

/// 对外只读的诊断快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticSnapshot {
    pub tracking: bool,
    pub calibrated: bool,
    pub fps: u32,
    pub debug: String,
    pub last_direction: Option<Direction>,
}

impl DiagnosticSnapshot {
    pub fn idle() -> Self {
        Self {
            tracking: false,
            calibrated: false,
            fps: 0,
            debug: "idle".to_string(),
            last_direction: None,
        }
    }
}

impl Default for DiagnosticSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// 帧率统计: 每满一秒刷新一次
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    count: u32,
    window_start: Option<Duration>,
    current: u32,
}

impl FpsCounter {
    pub fn tick(&mut self, now: Duration) -> u32 {
        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return self.current;
        };
        self.count += 1;

        let elapsed = now.saturating_sub(start);
        if elapsed >= Duration::from_secs(1) {
            self.current = (self.count as f64 / elapsed.as_secs_f64()).round() as u32;
            self.window_start = Some(now);
            self.count = 0;
        }
        self.current
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
