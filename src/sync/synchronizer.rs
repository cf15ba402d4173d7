// ==========================================
// 医生排班系统 - 持久化同步器
// ==========================================
// 职责: 持有内存中的月度排班, 防抖自动保存, 强制保存
// - 编辑: 修改内存排班 + 状态机记账 + 重置防抖计时器
// - 防抖到期: 后台保存（与强制保存共用同一把保存锁）
// - 强制保存: 取消计时器, 等待进行中的保存, 再保存最新内容
// 红线: 同一时刻最多一个保存在进行
// 红线: 保存失败不丢弃内存排班, 由调用方决定是否继续
// ==========================================

use crate::domain::roster::MonthRoster;
use crate::repository::roster_store::RosterStore;
use crate::sync::state::{SyncState, SyncStateMachine};
use crate::sync::{SyncError, SyncResult, SyncSettings};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

struct Session {
    roster: MonthRoster,
    machine: SyncStateMachine,
    timer: Option<JoinHandle<()>>,
}

impl Session {
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

struct Inner {
    store: Arc<dyn RosterStore>,
    settings: SyncSettings,
    session: Mutex<Session>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl Inner {
    fn session(&self) -> SyncResult<MutexGuard<'_, Session>> {
        self.session
            .lock()
            .map_err(|e| SyncError::LockError(e.to_string()))
    }

    /// 保存一次（串行化）
    ///
    /// # 返回
    /// - Ok(true): 写入了新内容
    /// - Ok(false): 没有需要保存的内容
    async fn flush(&self) -> SyncResult<bool> {
        let _guard = self.flush_lock.lock().await;

        let (revision, days) = {
            let mut session = self.session()?;
            match session.machine.begin_flush() {
                Some(revision) => (revision, session.roster.days.clone()),
                None => return Ok(false),
            }
        };

        debug!(revision, days = days.len(), "开始保存排班");
        let result = self.store.save_month_roster(&days).await;

        let mut session = self.session()?;
        match result {
            Ok(()) => {
                let state = session.machine.finish_flush(revision, Ok(()));
                debug!(revision, state = %state, "排班保存完成");
                Ok(true)
            }
            Err(e) => {
                let message = e.to_string();
                let state = session.machine.finish_flush(revision, Err(message.clone()));
                warn!(revision, state = %state, error = %message, "排班保存失败");
                Err(SyncError::PersistenceFailure(message))
            }
        }
    }
}

// ==========================================
// PersistenceSynchronizer
// ==========================================
#[derive(Clone)]
pub struct PersistenceSynchronizer {
    inner: Arc<Inner>,
}

impl PersistenceSynchronizer {
    /// 创建同步器, 初始状态 Clean
    pub fn new(store: Arc<dyn RosterStore>, roster: MonthRoster, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                session: Mutex::new(Session {
                    roster,
                    machine: SyncStateMachine::new(),
                    timer: None,
                }),
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// 当前状态
    pub fn state(&self) -> SyncResult<SyncState> {
        Ok(self.inner.session()?.machine.state())
    }

    /// 是否存在未落盘的修改
    pub fn is_dirty(&self) -> SyncResult<bool> {
        Ok(self.inner.session()?.machine.is_dirty())
    }

    /// 当前编辑版本号
    pub fn revision(&self) -> SyncResult<u64> {
        Ok(self.inner.session()?.machine.revision())
    }

    /// 最近一次保存失败的原因
    pub fn last_error(&self) -> SyncResult<Option<String>> {
        Ok(self
            .inner
            .session()?
            .machine
            .last_error()
            .map(str::to_string))
    }

    /// 内存排班快照
    pub fn snapshot(&self) -> SyncResult<MonthRoster> {
        Ok(self.inner.session()?.roster.clone())
    }

    /// 只读访问内存排班
    pub fn read<R>(&self, f: impl FnOnce(&MonthRoster) -> R) -> SyncResult<R> {
        let session = self.inner.session()?;
        Ok(f(&session.roster))
    }

    /// 修改内存排班并安排防抖保存
    ///
    /// 需在 tokio 运行时内调用
    pub fn mutate<R>(&self, f: impl FnOnce(&mut MonthRoster) -> R) -> SyncResult<R> {
        let mut session = self.inner.session()?;
        let out = f(&mut session.roster);
        let revision = session.machine.mark_edited();
        self.schedule(&mut session);
        debug!(revision, "排班已修改, 等待自动保存");
        Ok(out)
    }

    /// 整体替换内存排班（整月生成后）
    ///
    /// # 返回
    /// - Err(MonthMismatch): 会话已切换到其他月份, 内存排班保持不变
    pub fn replace(&self, roster: MonthRoster) -> SyncResult<()> {
        let mut session = self.inner.session()?;
        if (session.roster.year, session.roster.month) != (roster.year, roster.month) {
            let err = SyncError::MonthMismatch {
                current: format!("{}-{:02}", session.roster.year, session.roster.month),
                incoming: format!("{}-{:02}", roster.year, roster.month),
            };
            warn!(error = %err, "丢弃与当前月份不一致的排班");
            return Err(err);
        }
        session.roster = roster;
        let revision = session.machine.mark_edited();
        self.schedule(&mut session);
        debug!(revision, "整月排班已替换, 等待自动保存");
        Ok(())
    }

    fn schedule(&self, session: &mut Session) {
        session.cancel_timer();
        let inner = self.inner.clone();
        let delay = self.inner.settings.debounce;
        session.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // 保存放到独立任务中, 取消计时器不会打断进行中的保存
            tokio::spawn(async move {
                if let Err(e) = inner.flush().await {
                    warn!(error = %e, "自动保存失败, 保留未保存状态");
                }
            });
        }));
    }

    /// 立即保存（串行化, 不取消计时器）
    pub async fn flush(&self) -> SyncResult<bool> {
        self.inner.flush().await
    }

    /// 强制保存: 取消防抖计时器, 等待进行中的保存完成, 再保存最新内容
    ///
    /// # 返回
    /// - Ok(()): 内存排班已全部落盘
    /// - Err(PersistenceFailure): 保存失败, 内存排班保持未保存状态
    #[instrument(skip(self))]
    pub async fn force_flush(&self) -> SyncResult<()> {
        self.inner.session()?.cancel_timer();

        self.inner.flush().await?;

        // 等待期间的保存可能被新的编辑追上
        if self.is_dirty()? {
            self.inner.session()?.cancel_timer();
            self.inner.flush().await?;
        }
        info!("强制保存完成");
        Ok(())
    }

    /// 载入新的月度排班（调用方须先完成强制保存或显式放弃）
    ///
    /// # 返回
    /// - Err(UnsavedChanges): 强制保存之后又有新的编辑, 当前排班保持不变
    pub fn reset(&self, roster: MonthRoster) -> SyncResult<()> {
        let mut session = self.inner.session()?;
        if session.machine.is_dirty() {
            let pending = session
                .machine
                .revision()
                .saturating_sub(session.machine.saved_revision());
            return Err(SyncError::UnsavedChanges(pending));
        }
        session.cancel_timer();
        session.roster = roster;
        session.machine = SyncStateMachine::new();
        Ok(())
    }

    /// 放弃未保存修改（仅在用户显式确认后调用）
    pub fn discard_pending(&self) -> SyncResult<u64> {
        let mut session = self.inner.session()?;
        session.cancel_timer();
        let dropped = session
            .machine
            .revision()
            .saturating_sub(session.machine.saved_revision());
        session.machine.discard();
        warn!(dropped_revisions = dropped, "已放弃未保存的排班修改");
        Ok(dropped)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
