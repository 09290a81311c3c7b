// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 去抖状态机 (Debouncer)
//!
//! 候选方向需连续若干帧成立,且距上次触发超过最小间隔才会触发;
//! 与上次触发相同的方向永远不会重复触发,直到方向改变或跟踪丢失。

use crate::config::ControllerConfig;
use crate::detection::{Direction, DirectionEvent};
use std::time::Duration;

/// 进行中的候选方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub direction: Direction,
    pub frames: u32,
    pub confidence: f32, // 候选期间的最大置信度
}

/// 单帧去抖结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebounceOutcome {
    /// 无方向
    Neutral,
    /// 等待更多确认帧
    Pending {
        direction: Direction,
        frames: u32,
        required: u32,
    },
    /// 帧数已满足,等待最小间隔
    Cooldown {
        direction: Direction,
        remaining: Duration,
    },
    /// 与上次触发相同,视为已发出
    Suppressed(Direction),
    Emit(DirectionEvent),
}

pub struct Debouncer {
    candidate: Option<Candidate>,
    last_emitted: Option<Direction>,
    last_emit_at: Option<Duration>,

    high_confidence: f32,
    repeat_gap: Duration,
    change_gap: Duration,
}

impl Debouncer {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            candidate: None,
            last_emitted: None,
            last_emit_at: None,
            high_confidence: config.high_confidence,
            repeat_gap: Duration::from_millis(config.repeat_gap_ms),
            change_gap: Duration::from_millis(config.change_gap_ms),
        }
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.candidate
    }

    pub fn last_emitted(&self) -> Option<Direction> {
        self.last_emitted
    }

    pub fn last_emit_at(&self) -> Option<Duration> {
        self.last_emit_at
    }

    /// 清空候选与触发记录
    pub fn reset(&mut self) {
        self.candidate = None;
        self.last_emitted = None;
        self.last_emit_at = None;
    }

    pub fn step(&mut self, resolved: Option<(Direction, f32)>, now: Duration) -> DebounceOutcome {
        let Some((direction, confidence)) = resolved else {
            self.candidate = None;
            return DebounceOutcome::Neutral;
        };

        let candidate = match self.candidate {
            Some(mut c) if c.direction == direction => {
                c.frames += 1;
                c.confidence = c.confidence.max(confidence);
                c
            }
            _ => Candidate {
                direction,
                frames: 1,
                confidence,
            },
        };
        self.candidate = Some(candidate);

        // 高置信度单帧即可,模糊信号需两帧确认
        let required = if candidate.confidence >= self.high_confidence {
            1
        } else {
            2
        };
        if candidate.frames < required {
            return DebounceOutcome::Pending {
                direction,
                frames: candidate.frames,
                required,
            };
        }

        let repeat = self.last_emitted == Some(direction);
        let gap = if repeat {
            self.repeat_gap
        } else {
            self.change_gap
        };
        if let Some(at) = self.last_emit_at {
            let since = now.saturating_sub(at);
            if since < gap {
                return DebounceOutcome::Cooldown {
                    direction,
                    remaining: gap - since,
                };
            }
        }

        self.candidate = None;
        if repeat {
            return DebounceOutcome::Suppressed(direction);
        }

        self.last_emitted = Some(direction);
        self.last_emit_at = Some(now);
        DebounceOutcome::Emit(DirectionEvent {
            direction,
            confidence: candidate.confidence,
            timestamp: now,
        })
    }
}
