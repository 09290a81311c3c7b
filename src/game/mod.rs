// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 下游消费者接口 (Direction consumer)
///
/// 游戏只需要一个接收方向的入口和禁止掉头的转向规则;
/// 画面、计分与存档不在本库范围内。
use crate::detection::{Direction, DirectionEvent};

/// 方向接收者
pub trait DirectionSink {
    /// 请求转向; 返回请求是否被接受
    fn apply(&mut self, direction: Direction) -> bool;
}

/// 当前朝向 + 待生效转向
///
/// 每个 step 最多生效一次转向,连续两次快速转向不能组合成掉头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading {
    current: Direction,
    pending: Option<Direction>,
}

impl Heading {
    pub fn new(initial: Direction) -> Self {
        Self {
            current: initial,
            pending: None,
        }
    }

    pub fn current(&self) -> Direction {
        self.current
    }

    pub fn pending(&self) -> Option<Direction> {
        self.pending
    }

    /// 推进一步,返回本步使用的朝向
    pub fn step(&mut self) -> Direction {
        if let Some(next) = self.pending.take() {
            self.current = next;
        }
        self.current
    }
}

impl DirectionSink for Heading {
    fn apply(&mut self, direction: Direction) -> bool {
        // 以本步已生效的朝向为准判断掉头
        if direction == self.current || direction == self.current.opposite() {
            return false;
        }
        self.pending = Some(direction);
        true
    }
}

impl<F: FnMut(Direction) -> bool> DirectionSink for F {
    fn apply(&mut self, direction: Direction) -> bool {
        self(direction)
    }
}

/// 把方向事件转交给接收者
pub fn forward<D: DirectionSink + ?Sized>(sink: &mut D, event: &DirectionEvent) -> bool {
    sink.apply(event.direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reversal_rejected() {
        let mut heading = Heading::new(Direction::Right);
        assert!(!heading.apply(Direction::Left));
        assert!(!heading.apply(Direction::Right));
        assert_eq!(heading.step(), Direction::Right);
    }

    #[test]
    fn test_turn_applies_on_step() {
        let mut heading = Heading::new(Direction::Right);
        assert!(heading.apply(Direction::Up));
        assert_eq!(heading.current(), Direction::Right);
        assert_eq!(heading.step(), Direction::Up);
        assert!(heading.pending().is_none());
    }

    #[test]
    fn test_two_quick_turns_cannot_reverse() {
        let mut heading = Heading::new(Direction::Right);
        assert!(heading.apply(Direction::Up));
        // 同一步内再转左: 相对已生效朝向 (右) 是掉头
        assert!(!heading.apply(Direction::Left));
        assert!(heading.apply(Direction::Down));
        assert_eq!(heading.step(), Direction::Down);
        assert!(heading.apply(Direction::Left));
        assert_eq!(heading.step(), Direction::Left);
    }

    #[test]
    fn test_forward_event_to_closure() {
        let mut seen = Vec::new();
        let mut sink = |d: Direction| {
            seen.push(d);
            true
        };
        let event = DirectionEvent {
            direction: Direction::Down,
            confidence: 0.8,
            timestamp: Duration::ZERO,
        };
        assert!(forward(&mut sink, &event));
        assert_eq!(seen, vec![Direction::Down]);
    }
}
