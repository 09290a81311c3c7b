// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 基线标定 (Baseline calibration)
//!
//! 用户坐正时连续采样,取鼻子相对肩部中点偏移与肩宽的均值作为中立姿态。

use crate::config::ControllerConfig;
use crate::detection::{LandmarkLayout, LandmarkSnapshot, PoseSource};
use crate::error::{ControllerError, Result};
use crate::utils::Clock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// 中立姿态基线
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub nose_offset_x: f32,
    pub nose_offset_y: f32,
    pub shoulder_width: f32,
}

impl Baseline {
    pub fn new(nose_offset_x: f32, nose_offset_y: f32, shoulder_width: f32) -> Self {
        Self {
            nose_offset_x,
            nose_offset_y,
            shoulder_width,
        }
    }

    /// 单帧的原始测量值
    pub fn measure(snapshot: &LandmarkSnapshot) -> Self {
        let (x, y) = snapshot.nose_offset();
        Self::new(x, y, snapshot.shoulder_width())
    }

    /// 以系数 beta 向当前测量值靠拢 (漂移自适应)
    pub fn blend_toward(&mut self, target: &Baseline, beta: f32) {
        self.nose_offset_x += (target.nose_offset_x - self.nose_offset_x) * beta;
        self.nose_offset_y += (target.nose_offset_y - self.nose_offset_y) * beta;
        self.shoulder_width += (target.shoulder_width - self.shoulder_width) * beta;
    }

    /// 算术平均
    pub fn mean(samples: &[Baseline]) -> Option<Baseline> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f32;
        let (sx, sy, sw) = samples.iter().fold((0.0, 0.0, 0.0), |(x, y, w), s| {
            (x + s.nose_offset_x, y + s.nose_offset_y, w + s.shoulder_width)
        });
        Some(Baseline::new(sx / n, sy / n, sw / n))
    }
}

/// 标定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub baseline: Baseline,
    pub samples: usize,
    pub elapsed: Duration,
}

pub struct Calibrator {
    layout: LandmarkLayout,
    max_samples: usize,
    min_samples: usize,
    min_shoulder_width: f32,
    window: Duration,
    interval: Duration,
    samples: Vec<Baseline>,
}

impl Calibrator {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            layout: config.layout,
            max_samples: config.calibration_max_samples,
            min_samples: config.calibration_min_samples,
            min_shoulder_width: config.min_shoulder_width,
            window: config.calibration_window(),
            interval: config.calibration_sample_interval(),
            samples: Vec::with_capacity(config.calibration_max_samples),
        }
    }

    /// 提交一帧; 返回是否计为有效样本
    pub fn offer(&mut self, snapshot: &LandmarkSnapshot) -> bool {
        if self.is_full() {
            return false;
        }
        let sample = Baseline::measure(snapshot);
        if sample.shoulder_width <= self.min_shoulder_width {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max_samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// 样本足够时返回均值基线
    pub fn finish(&self) -> Result<Baseline> {
        if self.samples.len() < self.min_samples {
            return Err(ControllerError::CalibrationFailed {
                collected: self.samples.len(),
                required: self.min_samples,
            });
        }
        Baseline::mean(&self.samples).ok_or(ControllerError::CalibrationFailed {
            collected: 0,
            required: self.min_samples,
        })
    }

    /// 在时间窗内轮询来源直到采满或超时
    ///
    /// 每次采样之间通过 `clock.sleep` 让出控制权
    pub fn run<S, C>(&mut self, source: &mut S, clock: &C) -> Result<Calibration>
    where
        S: PoseSource + ?Sized,
        C: Clock + ?Sized,
    {
        self.samples.clear();
        let start = clock.now();
        let mut polls = 0u32;

        loop {
            let now = clock.now();
            if self.is_full() || now.saturating_sub(start) >= self.window {
                break;
            }

            polls += 1;
            let accepted = source
                .detect(now)
                .and_then(|set| LandmarkSnapshot::from_set(&set, self.layout))
                .map(|snapshot| self.offer(&snapshot))
                .unwrap_or(false);
            if accepted && self.is_full() {
                break;
            }

            clock.sleep(self.interval);
        }

        let elapsed = clock.now().saturating_sub(start);
        debug!(
            "标定采样: {} 次轮询, {} 个有效样本, 用时 {:?}",
            polls,
            self.samples.len(),
            elapsed
        );

        Ok(Calibration {
            baseline: self.finish()?,
            samples: self.samples.len(),
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{LandmarkSet, Point2, ReplaySource};
    use crate::utils::ManualClock;

    fn set(nose: (f32, f32), left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        LandmarkSet::from_core(
            LandmarkLayout::MediaPipe33,
            Point2::new(nose.0, nose.1),
            Point2::new(left.0, left.1),
            Point2::new(right.0, right.1),
        )
    }

    fn neutral(nose_x: f32, width: f32) -> LandmarkSet {
        set((nose_x, 0.3), (0.5 - width / 2.0, 0.5), (0.5 + width / 2.0, 0.5))
    }

    #[test]
    fn test_baseline_is_mean_of_valid_samples() {
        let frames: Vec<_> = [0.49, 0.50, 0.51, 0.52, 0.50, 0.48, 0.50]
            .iter()
            .enumerate()
            .map(|(i, &x)| Some(neutral(x, 0.2 + i as f32 * 0.01)))
            .collect();
        let expected: Vec<Baseline> = frames
            .iter()
            .flatten()
            .map(|s| {
                Baseline::measure(&LandmarkSnapshot::from_set(s, LandmarkLayout::MediaPipe33).unwrap())
            })
            .collect();
        let expected = Baseline::mean(&expected).unwrap();

        let mut source = ReplaySource::from_frames(frames, false);
        let clock = ManualClock::new();
        let mut calibrator = Calibrator::new(&ControllerConfig::default());
        let result = calibrator.run(&mut source, &clock).unwrap();

        assert_eq!(result.samples, 7);
        assert!((result.baseline.nose_offset_x - expected.nose_offset_x).abs() < 1e-6);
        assert!((result.baseline.nose_offset_y - expected.nose_offset_y).abs() < 1e-6);
        assert!((result.baseline.shoulder_width - expected.shoulder_width).abs() < 1e-6);
        assert!((result.baseline.shoulder_width - 0.23).abs() < 1e-5);
    }

    #[test]
    fn test_stops_at_max_samples() {
        let mut source = ReplaySource::from_frames(vec![Some(neutral(0.5, 0.2))], true);
        let clock = ManualClock::new();
        let mut calibrator = Calibrator::new(&ControllerConfig::default());
        let result = calibrator.run(&mut source, &clock).unwrap();
        assert_eq!(result.samples, 12);
        // 11 次让出后采满
        assert_eq!(result.elapsed, Duration::from_millis(11 * 16));
    }

    #[test]
    fn test_five_samples_fail() {
        let mut frames: Vec<_> = (0..5).map(|_| Some(neutral(0.5, 0.2))).collect();
        frames.extend((0..200).map(|_| None));
        let mut source = ReplaySource::from_frames(frames, false);
        let clock = ManualClock::new();
        let mut calibrator = Calibrator::new(&ControllerConfig::default());
        let err = calibrator.run(&mut source, &clock).unwrap_err();
        assert_eq!(
            err,
            ControllerError::CalibrationFailed {
                collected: 5,
                required: 6
            }
        );
        assert!(clock.now() >= Duration::from_millis(1800));
    }

    #[test]
    fn test_occlusion_for_whole_window_fails() {
        let mut source = ReplaySource::from_frames(vec![None], true);
        let clock = ManualClock::new();
        let mut calibrator = Calibrator::new(&ControllerConfig::default());
        assert!(matches!(
            calibrator.run(&mut source, &clock),
            Err(ControllerError::CalibrationFailed { collected: 0, .. })
        ));
        // 时间窗受限,不会无限轮询
        assert!(clock.now() < Duration::from_millis(1800 + 16));
    }

    #[test]
    fn test_degenerate_shoulders_not_counted() {
        let mut calibrator = Calibrator::new(&ControllerConfig::default());
        let collapsed = set((0.5, 0.3), (0.5, 0.5), (0.50005, 0.5));
        let snap = LandmarkSnapshot::from_set(&collapsed, LandmarkLayout::MediaPipe33).unwrap();
        assert!(!calibrator.offer(&snap));
        assert_eq!(calibrator.sample_count(), 0);
    }

    #[test]
    fn test_blend_toward() {
        let mut base = Baseline::new(0.0, 0.0, 0.2);
        base.blend_toward(&Baseline::new(0.1, -0.1, 0.3), 0.5);
        assert!((base.nose_offset_x - 0.05).abs() < 1e-6);
        assert!((base.nose_offset_y + 0.05).abs() < 1e-6);
        assert!((base.shoulder_width - 0.25).abs() < 1e-6);
    }
}
