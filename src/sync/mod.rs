// ==========================================
// 医生排班系统 - 持久化同步层
// ==========================================
// 职责: 内存排班的脏状态跟踪、防抖保存、切换前强制保存
// ==========================================

pub mod state;
pub mod synchronizer;

use std::time::Duration;
use thiserror::Error;

pub use state::{SyncState, SyncStateMachine};
pub use synchronizer::PersistenceSynchronizer;

/// 默认防抖时长（毫秒）
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;

/// 自动保存参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub debounce: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// 同步层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("排班保存失败: {0}")]
    PersistenceFailure(String),

    /// 替换内容与当前会话不是同一月份
    #[error("排班月份不一致: 当前 {current}, 提交 {incoming}")]
    MonthMismatch { current: String, incoming: String },

    /// 载入新月份时仍有未保存修改
    #[error("存在 {0} 个未保存的修改版本")]
    UnsavedChanges(u64),

    #[error("会话状态锁获取失败: {0}")]
    LockError(String),
}

/// Result 类型别名
pub type SyncResult<T> = Result<T, SyncError>;
