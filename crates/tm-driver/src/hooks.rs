//! 钩子系统
//!
//! 读线程每应用完一帧 TMSVR 数据，就依次触发已注册的 [`SyncHook`]。
//! 钩子在读线程上同步执行，必须尽快返回；需要做 I/O 的钩子
//! （如 CSV 日志）应把数据 `try_send` 到自己的工作线程。
//!
//! # 使用示例
//!
//! ```rust
//! use tm_driver::hooks::{HookManager, SyncHook};
//! use tm_driver::StateTable;
//! use tm_protocol::SvrPayload;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct FrameCounter(AtomicU64);
//!
//! impl SyncHook for FrameCounter {
//!     fn on_frame_applied(&self, _table: &StateTable, _payload: &SvrPayload) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let mut hooks = HookManager::new();
//! let id = hooks.add(Arc::new(FrameCounter(AtomicU64::new(0))));
//! assert_eq!(hooks.len(), 1);
//! assert!(hooks.remove(id));
//! ```

use crate::state::StateTable;
use std::sync::Arc;
use tm_protocol::SvrPayload;

/// 帧应用回调
pub trait SyncHook: Send + Sync {
    /// 一帧数据应用到状态表之后调用
    ///
    /// `payload` 为刚应用的原始数据块，`table` 已包含其中的新值。
    fn on_frame_applied(&self, table: &StateTable, payload: &SvrPayload);
}

/// 钩子句柄（用于移除）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// 钩子管理器
///
/// 本身不做同步，由持有者包在 `RwLock` 中共享给读线程。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<(HookId, Arc<dyn SyncHook>)>,
    next_id: u64,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, callback: Arc<dyn SyncHook>) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, callback));
        id
    }

    /// 移除指定钩子，返回是否存在
    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(hook_id, _)| *hook_id != id);
        self.callbacks.len() != before
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 按注册顺序触发所有钩子
    pub fn trigger_all(&self, table: &StateTable, payload: &SvrPayload) {
        for (_, callback) in &self.callbacks {
            callback.on_frame_applied(table, payload);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
