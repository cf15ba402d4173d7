// ==========================================
// 医生排班系统 - 自动保存状态机
// ==========================================
// 状态: Clean / Dirty / Saving / SaveFailed
// - 每次编辑递增 revision; saved_revision 记录最近一次落盘的版本
// - "是否有未保存内容" 只由 revision != saved_revision 决定
// - 同一时刻最多一个 in_flight 保存
// - 保存期间到达的编辑: 保存结束后无论成败都回到 Dirty
// - 没有未保存内容时只会是 Clean 或 Saving
// 纯状态, 不含 IO, 不含计时器
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    Clean,
    Dirty,
    Saving,
    SaveFailed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Clean => "CLEAN",
            SyncState::Dirty => "DIRTY",
            SyncState::Saving => "SAVING",
            SyncState::SaveFailed => "SAVE_FAILED",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// SyncStateMachine
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStateMachine {
    state: SyncState,
    revision: u64,
    saved_revision: u64,
    in_flight: Option<u64>,
    last_error: Option<String>,
}

impl SyncStateMachine {
    pub fn new() -> Self {
        Self {
            state: SyncState::Clean,
            revision: 0,
            saved_revision: 0,
            in_flight: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn saved_revision(&self) -> u64 {
        self.saved_revision
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 是否存在未落盘的修改（SaveFailed 也算）
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// 记录一次编辑（或一次成功的整月生成）
    ///
    /// 保存中到达的编辑不改变 Saving, 由 finish_flush 回到 Dirty
    pub fn mark_edited(&mut self) -> u64 {
        self.revision += 1;
        if self.state != SyncState::Saving {
            self.state = SyncState::Dirty;
        }
        self.revision
    }

    /// 开始一次保存
    ///
    /// # 返回
    /// - Some(revision): 本次保存覆盖到的版本
    /// - None: 已有保存在进行, 或没有未保存内容
    pub fn begin_flush(&mut self) -> Option<u64> {
        if self.in_flight.is_some() || !self.is_dirty() {
            return None;
        }
        self.in_flight = Some(self.revision);
        self.state = SyncState::Saving;
        Some(self.revision)
    }

    /// 结束一次保存
    ///
    /// # 参数
    /// - `revision`: begin_flush 返回的版本
    /// - `result`: 保存结果, 失败时带错误描述
    pub fn finish_flush(&mut self, revision: u64, result: Result<(), String>) -> SyncState {
        // 不是当前进行中的保存（例如状态已被重置）, 忽略
        if self.in_flight != Some(revision) {
            return self.state;
        }
        self.in_flight = None;

        match result {
            Ok(()) => {
                self.saved_revision = self.saved_revision.max(revision);
                self.last_error = None;
                self.state = if self.is_dirty() {
                    SyncState::Dirty
                } else {
                    SyncState::Clean
                };
            }
            Err(e) => {
                self.last_error = Some(e);
                self.state = if !self.is_dirty() {
                    // 保存期间已显式放弃
                    SyncState::Clean
                } else if self.revision > revision {
                    SyncState::Dirty
                } else {
                    SyncState::SaveFailed
                };
            }
        }
        self.state
    }

    /// 放弃未保存修改（用户显式确认后）
    pub fn discard(&mut self) {
        self.saved_revision = self.revision;
        self.last_error = None;
        if self.in_flight.is_none() {
            self.state = SyncState::Clean;
        }
    }
}

impl Default for SyncStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_then_successful_flush() {
        let mut m = SyncStateMachine::new();
        assert_eq!(m.begin_flush(), None);

        m.mark_edited();
        m.mark_edited();
        assert_eq!(m.state(), SyncState::Dirty);

        let rev = m.begin_flush().unwrap();
        assert_eq!(rev, 2);
        assert_eq!(m.state(), SyncState::Saving);
        assert_eq!(m.begin_flush(), None);

        assert_eq!(m.finish_flush(rev, Ok(())), SyncState::Clean);
        assert!(!m.is_dirty());
    }

    #[test]
    fn test_edit_during_saving_returns_to_dirty() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        let rev = m.begin_flush().unwrap();

        m.mark_edited();
        assert_eq!(m.state(), SyncState::Saving);

        assert_eq!(m.finish_flush(rev, Ok(())), SyncState::Dirty);
        assert!(m.is_dirty());
        assert_eq!(m.begin_flush(), Some(2));
    }

    #[test]
    fn test_failure_keeps_roster_dirty() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        let rev = m.begin_flush().unwrap();

        assert_eq!(m.finish_flush(rev, Err("disk full".into())), SyncState::SaveFailed);
        assert!(m.is_dirty());
        assert_eq!(m.last_error(), Some("disk full"));

        // 可以重试
        let retry = m.begin_flush().unwrap();
        assert_eq!(m.finish_flush(retry, Ok(())), SyncState::Clean);
        assert_eq!(m.last_error(), None);
    }

    #[test]
    fn test_failure_with_newer_edit_is_dirty() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        let rev = m.begin_flush().unwrap();
        m.mark_edited();
        assert_eq!(m.finish_flush(rev, Err("timeout".into())), SyncState::Dirty);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        let rev = m.begin_flush().unwrap();

        let mut fresh = SyncStateMachine::new();
        assert_eq!(fresh.finish_flush(rev, Ok(())), SyncState::Clean);
        assert_eq!(fresh.saved_revision(), 0);
        assert!(!fresh.is_dirty());

        assert_eq!(m.finish_flush(rev + 1, Ok(())), SyncState::Saving);
    }

    #[test]
    fn test_discard_during_save_then_failure_is_clean() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        let rev = m.begin_flush().unwrap();

        m.discard();
        assert_eq!(m.state(), SyncState::Saving);
        assert!(!m.is_dirty());

        assert_eq!(m.finish_flush(rev, Err("disk full".into())), SyncState::Clean);
        assert!(!m.is_dirty());
        assert_eq!(m.begin_flush(), None);
    }

    #[test]
    fn test_discard_clears_dirty() {
        let mut m = SyncStateMachine::new();
        m.mark_edited();
        m.discard();
        assert_eq!(m.state(), SyncState::Clean);
        assert!(!m.is_dirty());
    }
}
