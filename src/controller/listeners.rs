// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 方向事件订阅 (Direction listeners)
//!
//! 按注册顺序同步回调; 回调内不得再修改控制器,但可以增删订阅。

use crate::detection::DirectionEvent;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Listener = Box<dyn FnMut(&DirectionEvent) + Send>;

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    in_flight: Vec<u64>, // 正在分发 (已移出表) 的回调
    removed: Vec<u64>,   // 分发期间被取消的回调
}

impl ListenerRegistry {
    pub fn len(&self) -> usize {
        self.listeners.len() + self.in_flight.len() - self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        if self.listeners.len() != before {
            return true;
        }
        if self.in_flight.contains(&id) && !self.removed.contains(&id) {
            self.removed.push(id);
            return true;
        }
        false
    }

    fn take_for_dispatch(&mut self) -> Vec<(u64, Listener)> {
        let active = std::mem::take(&mut self.listeners);
        self.in_flight = active.iter().map(|(id, _)| *id).collect();
        active
    }

    /// 分发结束: 丢弃期间取消的回调,期间新增的回调排在后面
    fn restore(&mut self, mut active: Vec<(u64, Listener)>) {
        let removed = std::mem::take(&mut self.removed);
        self.in_flight.clear();
        active.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::replace(&mut self.listeners, active);
        self.listeners.extend(added);
    }
}

/// 共享的订阅表,订阅句柄只持有弱引用
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<ListenerRegistry>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ListenerRegistry> {
        // 回调 panic 后表本身仍然完整
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&DirectionEvent) + Send + 'static,
    {
        let id = self.lock().add(Box::new(listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// 回调执行时不持有锁,回调内可以调用 `Subscription::unsubscribe`
    pub fn dispatch(&self, event: &DirectionEvent) {
        let mut active = self.lock().take_for_dispatch();
        for (_, listener) in active.iter_mut() {
            listener(event);
        }
        self.lock().restore(active);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// 订阅句柄; 丢弃句柄不会取消订阅,需显式调用 `unsubscribe`
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 取消订阅; 返回是否确实移除了回调
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(self.id),
            None => false,
        }
    }
}
