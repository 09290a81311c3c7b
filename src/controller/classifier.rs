// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 方向分类 (Direction classification)
//!
//! 鼻子偏移 → 相对基线归一化 → 指数平滑 → 基线漂移自适应 → 方向判定

use super::calibrator::Baseline;
use crate::config::ControllerConfig;
use crate::detection::{Direction, LandmarkSnapshot};

/// 方向判定阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveParams {
    pub horizontal_factor: f32,
    pub down_factor: f32,
    pub up_factor: f32,
    pub dominance_ratio: f32,
    pub confidence_span: f32,
}

impl ResolveParams {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            horizontal_factor: config.horizontal_factor,
            down_factor: config.down_factor,
            up_factor: config.up_factor,
            dominance_ratio: config.dominance_ratio,
            confidence_span: config.confidence_span,
        }
    }
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// 由 (dx, dy, 阈值) 判定方向与置信度
///
/// 水平轴需明显占优; 低头比抬头更容易触发 (抬头自然幅度更小)
pub fn resolve_direction(
    dx: f32,
    dy: f32,
    threshold: f32,
    params: &ResolveParams,
) -> Option<(Direction, f32)> {
    let horizontal = params.horizontal_factor * threshold;
    let down = params.down_factor * threshold;
    let up = params.up_factor * threshold;
    let span = params.confidence_span;

    if dx.abs() >= dy.abs() * params.dominance_ratio && dx.abs() > horizontal {
        let direction = if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        };
        return Some((direction, clamp01(dx.abs() / (span * horizontal))));
    }

    if dy.abs() >= dx.abs() * params.dominance_ratio {
        if dy > down {
            return Some((Direction::Down, clamp01(dy / (span * down))));
        }
        if dy < -up {
            return Some((Direction::Up, clamp01(-dy / (span * up))));
        }
    }

    None
}

/// 单帧分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification {
    /// 尚未标定
    Uncalibrated,
    Measured {
        dx: f32,
        dy: f32,
        smoothed_dx: f32,
        smoothed_dy: f32,
        threshold: f32,
        near_neutral: bool,
        resolved: Option<(Direction, f32)>,
    },
}

/// 方向分类器: 持有基线与平滑信号
pub struct DirectionClassifier {
    baseline: Option<Baseline>,
    smoothed_dx: f32,
    smoothed_dy: f32,

    sensitivity: f32,
    mirror_horizontal: bool,

    threshold_scale: f32,
    min_sensitivity: f32,
    alpha: f32,
    beta: f32,
    neutral_gate_x: f32,
    neutral_gate_y: f32,
    params: ResolveParams,
}

impl DirectionClassifier {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            baseline: None,
            smoothed_dx: 0.0,
            smoothed_dy: 0.0,
            sensitivity: config.sensitivity,
            mirror_horizontal: config.mirror_horizontal,
            threshold_scale: config.threshold_scale,
            min_sensitivity: config.min_sensitivity,
            alpha: config.smoothing_alpha,
            beta: config.drift_beta,
            neutral_gate_x: config.neutral_gate_x,
            neutral_gate_y: config.neutral_gate_y,
            params: ResolveParams::from_config(config),
        }
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// 写入新基线并清空平滑状态
    pub fn set_baseline(&mut self, baseline: Baseline) {
        self.baseline = Some(baseline);
        self.reset_signal();
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
        self.reset_signal();
    }

    pub fn reset_signal(&mut self) {
        self.smoothed_dx = 0.0;
        self.smoothed_dy = 0.0;
    }

    pub fn smoothed(&self) -> (f32, f32) {
        (self.smoothed_dx, self.smoothed_dy)
    }

    pub fn set_mirror_horizontal(&mut self, mirror: bool) {
        self.mirror_horizontal = mirror;
    }

    pub fn mirror_horizontal(&self) -> bool {
        self.mirror_horizontal
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// 判定阈值,随人与摄像头的距离 (肩宽) 等比缩放
    pub fn threshold(&self, shoulder_width: f32) -> f32 {
        let reference = match self.baseline {
            Some(b) => (shoulder_width + b.shoulder_width) / 2.0,
            None => shoulder_width,
        };
        (self.threshold_scale / self.sensitivity.max(self.min_sensitivity)) * reference
    }

    pub fn classify(&mut self, snapshot: &LandmarkSnapshot) -> Classification {
        let Some(mut baseline) = self.baseline else {
            return Classification::Uncalibrated;
        };

        let raw = Baseline::measure(snapshot);
        let mut dx = raw.nose_offset_x - baseline.nose_offset_x;
        let dy = raw.nose_offset_y - baseline.nose_offset_y;
        if self.mirror_horizontal {
            dx = -dx;
        }

        let threshold = self.threshold(raw.shoulder_width);

        self.smoothed_dx = self.smoothed_dx * (1.0 - self.alpha) + dx * self.alpha;
        self.smoothed_dy = self.smoothed_dy * (1.0 - self.alpha) + dy * self.alpha;

        // 接近中立时基线向原始 (未平滑) 测量值缓慢靠拢
        let near_neutral = self.smoothed_dx.abs() < self.neutral_gate_x * threshold
            && self.smoothed_dy.abs() < self.neutral_gate_y * threshold;
        if near_neutral {
            baseline.blend_toward(&raw, self.beta);
            self.baseline = Some(baseline);
        }

        let resolved = resolve_direction(self.smoothed_dx, self.smoothed_dy, threshold, &self.params);

        Classification::Measured {
            dx,
            dy,
            smoothed_dx: self.smoothed_dx,
            smoothed_dy: self.smoothed_dy,
            threshold,
            near_neutral,
            resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point2;

    fn snapshot(nose_dx: f32, nose_dy: f32, width: f32) -> LandmarkSnapshot {
        LandmarkSnapshot::new(
            Point2::new(0.5 + nose_dx, 0.5 + nose_dy),
            Point2::new(0.5 - width / 2.0, 0.5),
            Point2::new(0.5 + width / 2.0, 0.5),
        )
    }

    fn calibrated() -> DirectionClassifier {
        let mut classifier = DirectionClassifier::new(&ControllerConfig::default());
        classifier.set_baseline(Baseline::new(0.0, 0.0, 0.2));
        classifier
    }

    #[test]
    fn test_resolve_horizontal() {
        let p = ResolveParams::default();
        let (dir, conf) = resolve_direction(0.05, 0.0, 0.018, &p).unwrap();
        assert_eq!(dir, Direction::Right);
        assert_eq!(conf, 1.0);

        let (dir, conf) = resolve_direction(-0.02, 0.0, 0.018, &p).unwrap();
        assert_eq!(dir, Direction::Left);
        assert!((conf - 0.02 / (2.1 * 0.95 * 0.018)).abs() < 1e-5);

        // 未超过水平阈值
        assert!(resolve_direction(0.017, 0.0, 0.018, &p).is_none());
    }

    #[test]
    fn test_resolve_vertical_asymmetry() {
        let p = ResolveParams::default();
        let t = 0.018;
        // 0.02 超过低头阈值 (1.05t) 但未超过抬头阈值 (1.35t)
        assert_eq!(
            resolve_direction(0.0, 0.02, t, &p).map(|r| r.0),
            Some(Direction::Down)
        );
        assert!(resolve_direction(0.0, -0.02, t, &p).is_none());
        let (dir, conf) = resolve_direction(0.0, -0.03, t, &p).unwrap();
        assert_eq!(dir, Direction::Up);
        assert!((conf - 0.03 / (2.1 * 1.35 * t)).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_ambiguous_diagonal() {
        let p = ResolveParams::default();
        // 两轴幅度接近,没有主轴
        assert!(resolve_direction(0.05, 0.05, 0.018, &p).is_none());
        assert!(resolve_direction(0.05, -0.047, 0.018, &p).is_none());
        // 水平占优 1.12 倍即可
        assert_eq!(
            resolve_direction(0.0449, 0.04, 0.018, &p).map(|r| r.0),
            Some(Direction::Right)
        );
    }

    #[test]
    fn test_uncalibrated() {
        let mut classifier = DirectionClassifier::new(&ControllerConfig::default());
        assert_eq!(
            classifier.classify(&snapshot(0.0, -0.2, 0.2)),
            Classification::Uncalibrated
        );
    }

    #[test]
    fn test_threshold_scales_with_distance() {
        let classifier = calibrated();
        assert!((classifier.threshold(0.2) - 0.018).abs() < 1e-6);
        // 靠近摄像头 (肩宽变大) 阈值变大
        assert!((classifier.threshold(0.4) - 0.027).abs() < 1e-6);
    }

    #[test]
    fn test_sensitivity_floor() {
        let mut classifier = calibrated();
        classifier.set_sensitivity(0.1);
        assert!((classifier.threshold(0.2) - 0.09 / 0.4 * 0.2).abs() < 1e-6);
        classifier.set_sensitivity(2.0);
        assert!((classifier.threshold(0.2) - 0.009).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_converges() {
        let mut classifier = calibrated();
        let first = classifier.classify(&snapshot(0.05, 0.0, 0.2));
        match first {
            Classification::Measured { dx, smoothed_dx, .. } => {
                assert!((dx - 0.05).abs() < 1e-6);
                assert!((smoothed_dx - 0.0225).abs() < 1e-6);
            }
            _ => panic!("expected measurement"),
        }
        classifier.classify(&snapshot(0.05, 0.0, 0.2));
        let (sdx, _) = classifier.smoothed();
        assert!((sdx - 0.034875).abs() < 1e-6);
    }

    #[test]
    fn test_mirror_flips_horizontal() {
        let mut classifier = calibrated();
        classifier.set_mirror_horizontal(true);
        for _ in 0..10 {
            classifier.classify(&snapshot(0.05, 0.0, 0.2));
        }
        match classifier.classify(&snapshot(0.05, 0.0, 0.2)) {
            Classification::Measured { resolved, .. } => {
                assert_eq!(resolved.map(|r| r.0), Some(Direction::Left))
            }
            _ => panic!("expected measurement"),
        }
    }

    #[test]
    fn test_drift_only_near_neutral() {
        let mut classifier = calibrated();
        // 轻微偏移 (低于中立门限) → 基线向原始值靠拢
        classifier.classify(&snapshot(0.004, 0.0, 0.22));
        let b = classifier.baseline().unwrap();
        assert!((b.nose_offset_x - 0.004 * 0.035).abs() < 1e-6);
        assert!((b.shoulder_width - (0.2 + 0.02 * 0.035)).abs() < 1e-6);

        // 明显偏头 → 基线不动
        let mut classifier = calibrated();
        classifier.classify(&snapshot(0.08, 0.0, 0.2));
        assert_eq!(classifier.baseline(), Some(Baseline::new(0.0, 0.0, 0.2)));
    }

    #[test]
    fn test_drift_uses_raw_offset() {
        let mut classifier = calibrated();
        classifier.set_mirror_horizontal(true);
        // 镜像只影响分类信号,不影响基线自适应方向
        classifier.classify(&snapshot(0.004, 0.0, 0.2));
        let b = classifier.baseline().unwrap();
        assert!(b.nose_offset_x > 0.0);
    }

    #[test]
    fn test_vertical_neutral_gate_is_wider() {
        // 阈值 0.018, 单帧平滑后 0.45 * 0.028 = 0.0126: 介于 0.65 与 0.75 倍阈值之间
        let mut classifier = calibrated();
        classifier.classify(&snapshot(0.0, 0.028, 0.2));
        let b = classifier.baseline().unwrap();
        assert!((b.nose_offset_y - 0.028 * 0.035).abs() < 1e-6);

        // 同样幅度放在水平方向则超出 0.65 门限
        let mut classifier = calibrated();
        classifier.classify(&snapshot(0.028, 0.0, 0.2));
        assert_eq!(classifier.baseline(), Some(Baseline::new(0.0, 0.0, 0.2)));
    }

    #[test]
    fn test_no_drift_above_vertical_gate() {
        // 0.45 * 0.032 = 0.0144 > 0.75 * 0.018
        let mut classifier = calibrated();
        match classifier.classify(&snapshot(0.0, 0.032, 0.2)) {
            Classification::Measured { near_neutral, .. } => assert!(!near_neutral),
            other => panic!("unexpected classification: {:?}", other),
        }
        assert_eq!(classifier.baseline(), Some(Baseline::new(0.0, 0.0, 0.2)));
    }
}
