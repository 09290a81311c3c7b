// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 姿态方向控制器 (Pose Direction Controller)
///
/// 用头部动作驱动游戏方向键
///
/// 运行流程:
/// 1. 主线程:   定时器驱动逐帧检测 + 分类 + 去抖
/// 2. 消费线程: 接收方向事件 → 转向规则 → 写出事件日志
use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, tick, unbounded};
use mimalloc::MiMalloc;
use pose_direction_rs::controller::MotionController;
use pose_direction_rs::detection::{
    LandmarkLayout, LandmarkSet, PoseSource, ReplaySource, SyntheticSource,
};
use pose_direction_rs::{
    gen_time_string, ControllerConfig, ControllerError, Direction, DirectionEvent, DirectionSink,
    Heading, MonotonicClock,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 标定失败后的最大重试次数
const CALIBRATION_ATTEMPTS: usize = 3;

/// 控制器参数
#[derive(Parser, Debug)]
#[command(author, version, about = "姿态方向控制器 - 用头部动作控制游戏", long_about = None)]
struct Args {
    /// 关键点录制文件 (JSON lines)
    #[arg(short, long, conflicts_with = "synthetic")]
    replay: Option<PathBuf>,

    /// 循环回放
    #[arg(long, default_value_t = false)]
    r#loop: bool,

    /// 使用合成姿态 (演示)
    #[arg(short, long, default_value_t = false)]
    synthetic: bool,

    /// 合成姿态掉帧率
    #[arg(long, default_value_t = 0.02)]
    dropout: f64,

    /// 随机种子
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// 配置文件路径 (默认: 用户配置目录)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 逐帧频率
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// 水平镜像 (前置摄像头); 未指定时沿用配置文件
    #[arg(long, default_value_t = false)]
    mirror: bool,

    /// 灵敏度
    #[arg(long)]
    sensitivity: Option<f32>,

    /// 方向事件输出文件 (JSON lines)
    #[arg(short, long)]
    events_out: Option<PathBuf>,

    /// 运行时长 (秒, 0 为不限)
    #[arg(short, long, default_value_t = 20)]
    duration_secs: u64,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// 输入来源
enum Input {
    Replay(ReplaySource),
    Synthetic(SyntheticSource),
}

impl Input {
    fn is_finished(&self) -> bool {
        match self {
            Input::Replay(r) => r.is_finished(),
            Input::Synthetic(_) => false,
        }
    }
}

impl PoseSource for Input {
    fn open(&mut self) -> pose_direction_rs::Result<()> {
        match self {
            Input::Replay(r) => r.open(),
            Input::Synthetic(s) => s.open(),
        }
    }

    fn detect(&mut self, timestamp: Duration) -> Option<LandmarkSet> {
        match self {
            Input::Replay(r) => r.detect(timestamp),
            Input::Synthetic(s) => s.detect(timestamp),
        }
    }

    fn close(&mut self) {
        match self {
            Input::Replay(r) => r.close(),
            Input::Synthetic(s) => s.close(),
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_input(args: &Args, layout: LandmarkLayout) -> Result<Input> {
    if let Some(path) = &args.replay {
        return Ok(Input::Replay(ReplaySource::from_file(path, args.r#loop)));
    }
    if !args.synthetic {
        anyhow::bail!("需要指定输入: --replay <文件> 或 --synthetic");
    }
    Ok(Input::Synthetic(
        SyntheticSource::demo(layout, args.seed).with_dropout(args.dropout),
    ))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    // ========== 配置 ==========
    let config_path = args.config.clone().unwrap_or_else(ControllerConfig::default_path);
    let mut config = ControllerConfig::load(&config_path);
    if args.mirror {
        config.mirror_horizontal = true;
    }
    if let Some(sensitivity) = args.sensitivity {
        config.sensitivity = sensitivity;
    }
    config.print_summary();

    let input = build_input(&args, config.layout)?;
    let mut controller = MotionController::new(input, MonotonicClock::new(), config)
        .context("控制器配置无效")?;

    info!("🚀 姿态方向控制器启动");
    controller.start().context("姿态来源启动失败")?;

    // ========== 标定 ==========
    let mut calibrated = false;
    for attempt in 1..=CALIBRATION_ATTEMPTS {
        match controller.calibrate() {
            Ok(_) => {
                calibrated = true;
                break;
            }
            Err(ControllerError::CalibrationFailed { collected, required }) => {
                warn!(
                    "⚠️  标定失败 ({}/{}): 有效样本 {}/{}",
                    attempt, CALIBRATION_ATTEMPTS, collected, required
                );
            }
            Err(e) => return Err(e).context("标定出错"),
        }
    }
    if !calibrated {
        controller.stop();
        anyhow::bail!("标定失败 {} 次,请确认画面中有人且坐正", CALIBRATION_ATTEMPTS);
    }

    // ========== 消费线程: 事件 → 转向规则 → 日志文件 ==========
    let events_path = args
        .events_out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("events_{}.jsonl", gen_time_string("-"))));
    let file = File::create(&events_path)
        .with_context(|| format!("无法创建事件文件: {}", events_path.display()))?;
    info!("📝 方向事件写入 {}", events_path.display());

    let (tx, rx) = unbounded::<DirectionEvent>();
    let subscription = controller.on_direction(move |event| {
        let _ = tx.send(*event);
    });

    let consumer = std::thread::spawn(move || -> Result<usize> {
        let mut writer = BufWriter::new(file);
        let mut heading = Heading::new(Direction::Right);
        let mut count = 0;
        for event in rx {
            let accepted = heading.apply(event.direction);
            heading.step();
            info!(
                "🎮 方向: {:<5} 置信度 {:.2} | 转向{} | 当前朝向 {}",
                event.direction,
                event.confidence,
                if accepted { "接受" } else { "忽略" },
                heading.current()
            );
            serde_json::to_writer(&mut writer, &event)?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    });

    // ========== 主循环: 定时逐帧 ==========
    let fps = args.fps.max(1);
    let ticker = tick(Duration::from_secs_f64(1.0 / fps as f64));
    let report = tick(Duration::from_secs(1));
    let deadline = (args.duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(args.duration_secs));

    loop {
        select! {
            recv(ticker) -> _ => {
                controller.tick();
                if controller.source().is_finished() {
                    info!("📼 回放结束");
                    break;
                }
            }
            recv(report) -> _ => {
                let snap = controller.snapshot();
                info!(
                    "📊 跟踪: {} | 标定: {} | {}fps | 最近方向: {} | {}",
                    snap.tracking,
                    snap.calibrated,
                    snap.fps,
                    snap.last_direction.map(|d| d.as_str()).unwrap_or("-"),
                    snap.debug
                );
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    // 取消订阅后发送端被释放,消费线程随之退出
    subscription.unsubscribe();
    controller.stop();

    let written = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("消费线程异常退出"))??;
    info!("✅ 共输出 {} 个方向事件", written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_is_a_plain_flag() {
        let args = Args::try_parse_from(["pose-direction", "--synthetic", "--mirror"]).unwrap();
        assert!(args.mirror);
        let args = Args::try_parse_from(["pose-direction", "--synthetic"]).unwrap();
        assert!(!args.mirror);
        assert!(Args::try_parse_from(["pose-direction", "--mirror", "true"]).is_err());
    }
}
