// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 动作控制器 (Motion Controller)
///
/// 单线程逐帧驱动:
/// - Calibrator:  中立姿态基线标定
/// - Classifier:  归一化 + 平滑 + 漂移自适应 + 方向判定
/// - Debouncer:   连续帧确认 + 最小间隔 + 重复抑制
/// - Listeners:   方向事件按注册顺序分发
///
/// 所有公开入口都假定独占访问; 多线程宿主需要把整个控制器放进 Mutex。
pub mod calibrator;
pub mod classifier;
pub mod debounce;
pub mod diagnostics;
pub mod listeners;

pub use calibrator::{Baseline, Calibration, Calibrator};
pub use classifier::{resolve_direction, Classification, DirectionClassifier, ResolveParams};
pub use debounce::{Candidate, DebounceOutcome, Debouncer};
pub use diagnostics::{DiagnosticSnapshot, FpsCounter};
pub use listeners::{Listeners, Subscription};

use crate::config::ControllerConfig;
use crate::detection::{DirectionEvent, LandmarkLayout, LandmarkSet, LandmarkSnapshot, PoseSource};
use crate::error::{ControllerError, Result};
use crate::utils::Clock;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct MotionController<S: PoseSource, C: Clock> {
    source: S,
    clock: C,
    config: ControllerConfig,
    layout: LandmarkLayout,
    running: bool,

    classifier: DirectionClassifier,
    debouncer: Debouncer,
    listeners: Listeners,

    // 诊断
    fps: FpsCounter,
    snapshot: DiagnosticSnapshot,
}

impl<S: PoseSource, C: Clock> MotionController<S, C> {
    pub fn new(source: S, clock: C, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            clock,
            layout: config.layout,
            running: false,
            classifier: DirectionClassifier::new(&config),
            debouncer: Debouncer::new(&config),
            listeners: Listeners::new(),
            fps: FpsCounter::default(),
            snapshot: DiagnosticSnapshot::idle(),
            config,
        })
    }

    /// 打开姿态来源,开始逐帧检测
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        if let Err(e) = self.source.open() {
            warn!("❌ 姿态来源启动失败: {}", e);
            self.snapshot.debug = format!("start failed: {}", e);
            return Err(e);
        }

        self.reset_transient();
        self.classifier.clear_baseline();
        self.fps.reset();
        self.running = true;
        self.snapshot = DiagnosticSnapshot {
            debug: "started".to_string(),
            ..DiagnosticSnapshot::idle()
        };
        info!("🚀 动作控制器启动 (布局: {:?})", self.layout);
        Ok(())
    }

    /// 停止并释放全部状态; 重复调用无副作用
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.source.close();
        self.classifier.clear_baseline();
        self.debouncer.reset();
        self.fps.reset();
        self.snapshot = DiagnosticSnapshot::idle();
        info!("🛑 动作控制器已停止");
    }

    /// 标定中立姿态
    ///
    /// 最多采样 12 帧或 1.8 秒; 有效样本不足 6 个时失败且不写入基线
    pub fn calibrate(&mut self) -> Result<Baseline> {
        if !self.running {
            return Err(ControllerError::NotStarted);
        }

        info!("🎯 开始标定,请保持坐正...");
        self.classifier.clear_baseline();
        self.debouncer.reset();
        self.snapshot.calibrated = false;
        self.snapshot.debug = "calibrating".to_string();

        let mut calibrator = Calibrator::new(&self.config);
        match calibrator.run(&mut self.source, &self.clock) {
            Ok(calibration) => {
                let baseline = calibration.baseline;
                self.classifier.set_baseline(baseline);
                self.debouncer.reset();
                self.snapshot.calibrated = true;
                self.snapshot.debug = format!("calibrated ({} samples)", calibration.samples);
                info!(
                    "✅ 标定完成: {} 个样本, 用时 {}ms | 偏移 ({:.4}, {:.4}) 肩宽 {:.4}",
                    calibration.samples,
                    calibration.elapsed.as_millis(),
                    baseline.nose_offset_x,
                    baseline.nose_offset_y,
                    baseline.shoulder_width
                );
                Ok(baseline)
            }
            Err(e) => {
                warn!("⚠️  标定失败: {}", e);
                self.snapshot.debug = format!("calibration failed: {}", e);
                Err(e)
            }
        }
    }

    /// 从来源取一帧并处理 (时间戳取自时钟)
    pub fn tick(&mut self) -> Option<DirectionEvent> {
        if !self.running {
            return None;
        }
        let now = self.clock.now();
        let set = self.source.detect(now);
        self.update(set.as_ref(), now)
    }

    /// 逐帧处理: 输入本帧关键点 (可能为空) 与单调时间戳
    pub fn update(&mut self, landmarks: Option<&LandmarkSet>, now: Duration) -> Option<DirectionEvent> {
        if !self.running {
            return None;
        }
        self.snapshot.fps = self.fps.tick(now);

        // 1. 跟踪丢失: 清空平滑/候选/触发记录
        let layout = self.layout;
        let Some(snapshot) = landmarks.and_then(|set| LandmarkSnapshot::from_set(set, layout)) else {
            self.reset_transient();
            self.snapshot.tracking = false;
            self.snapshot.debug = "no pose".to_string();
            return None;
        };
        self.snapshot.tracking = true;

        // 2-6. 归一化 / 平滑 / 漂移 / 判定
        let (resolved, detail) = match self.classifier.classify(&snapshot) {
            Classification::Uncalibrated => {
                self.snapshot.calibrated = false;
                self.snapshot.debug = "waiting for calibration".to_string();
                return None;
            }
            Classification::Measured {
                smoothed_dx,
                smoothed_dy,
                threshold,
                resolved,
                ..
            } => (
                resolved,
                format!("dx={:+.4} dy={:+.4} thr={:.4}", smoothed_dx, smoothed_dy, threshold),
            ),
        };
        self.snapshot.calibrated = true;

        // 7. 去抖
        let outcome = self.debouncer.step(resolved, now);
        self.snapshot.debug = match outcome {
            DebounceOutcome::Neutral => format!("neutral {}", detail),
            DebounceOutcome::Pending {
                direction,
                frames,
                required,
            } => format!("candidate {} {}/{} {}", direction, frames, required, detail),
            DebounceOutcome::Cooldown {
                direction,
                remaining,
            } => format!("cooldown {} {}ms", direction, remaining.as_millis()),
            DebounceOutcome::Suppressed(direction) => format!("repeat {} suppressed", direction),
            DebounceOutcome::Emit(event) => {
                format!("emit {} conf={:.2}", event.direction, event.confidence)
            }
        };
        debug!("{}", self.snapshot.debug);

        match outcome {
            DebounceOutcome::Emit(event) => {
                self.snapshot.last_direction = Some(event.direction);
                self.listeners.dispatch(&event);
                Some(event)
            }
            _ => None,
        }
    }

    /// 注册方向回调 (同步,按注册顺序调用)
    pub fn on_direction<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&DirectionEvent) + Send + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// 下一帧起生效
    pub fn set_mirror_horizontal(&mut self, mirror: bool) {
        self.classifier.set_mirror_horizontal(mirror);
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.classifier.set_sensitivity(sensitivity);
    }

    pub fn snapshot(&self) -> DiagnosticSnapshot {
        self.snapshot.clone()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.classifier.baseline()
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.debouncer.candidate()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn reset_transient(&mut self) {
        self.classifier.reset_signal();
        self.debouncer.reset();
    }
}
