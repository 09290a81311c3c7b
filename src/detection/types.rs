// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 姿态方向系统数据结构定义
/// Data structures for the pose direction system
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ========== 枚举类型 ==========

/// 关键点索引布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkLayout {
    /// MediaPipe Pose 33点: 0-鼻子, 11-左肩, 12-右肩
    #[default]
    MediaPipe33,
    /// COCO 17点 (YOLOv8-pose): 0-鼻子, 5-左肩, 6-右肩
    Coco17,
}

impl LandmarkLayout {
    pub fn nose(&self) -> usize {
        0
    }

    pub fn left_shoulder(&self) -> usize {
        match self {
            LandmarkLayout::MediaPipe33 => 11,
            LandmarkLayout::Coco17 => 5,
        }
    }

    pub fn right_shoulder(&self) -> usize {
        match self {
            LandmarkLayout::MediaPipe33 => 12,
            LandmarkLayout::Coco17 => 6,
        }
    }

    /// 一组完整关键点的数量
    pub fn point_count(&self) -> usize {
        match self {
            LandmarkLayout::MediaPipe33 => 33,
            LandmarkLayout::Coco17 => 17,
        }
    }
}

/// 离散方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== 数据结构 ==========

#[derive(Debug, PartialEq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point2 {
    // 归一化图像坐标 [0,1]
    x: f32,
    y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// 检测器输出的一组关键点 (单人),按关键点索引访问
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Option<Point2>>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Option<Point2>>) -> Self {
        Self { points }
    }

    /// 只包含鼻子和双肩的关键点集合,其余位置为空
    pub fn from_core(layout: LandmarkLayout, nose: Point2, left: Point2, right: Point2) -> Self {
        let mut points = vec![None; layout.point_count()];
        points[layout.nose()] = Some(nose);
        points[layout.left_shoulder()] = Some(left);
        points[layout.right_shoulder()] = Some(right);
        Self { points }
    }

    /// 取关键点; 越界或坐标非有限值视为缺失
    pub fn get(&self, index: usize) -> Option<Point2> {
        self.points
            .get(index)
            .copied()
            .flatten()
            .filter(Point2::is_finite)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 单帧快照: 分类所需的三个关键点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSnapshot {
    pub nose: Point2,
    pub left_shoulder: Point2,
    pub right_shoulder: Point2,
}

impl LandmarkSnapshot {
    pub fn new(nose: Point2, left_shoulder: Point2, right_shoulder: Point2) -> Self {
        Self {
            nose,
            left_shoulder,
            right_shoulder,
        }
    }

    /// 从关键点集合提取; 任一关键点缺失则返回 None
    pub fn from_set(set: &LandmarkSet, layout: LandmarkLayout) -> Option<Self> {
        Some(Self {
            nose: set.get(layout.nose())?,
            left_shoulder: set.get(layout.left_shoulder())?,
            right_shoulder: set.get(layout.right_shoulder())?,
        })
    }

    pub fn shoulder_center(&self) -> Point2 {
        self.left_shoulder.midpoint(&self.right_shoulder)
    }

    pub fn shoulder_width(&self) -> f32 {
        self.left_shoulder.distance(&self.right_shoulder)
    }

    /// 鼻子相对肩部中点的偏移 (x, y)
    pub fn nose_offset(&self) -> (f32, f32) {
        let center = self.shoulder_center();
        (self.nose.x() - center.x(), self.nose.y() - center.y())
    }
}

/// 方向事件 (控制器 → 订阅者)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionEvent {
    pub direction: Direction,
    pub confidence: f32, // [0,1]
    pub timestamp: Duration,
}
