// ==========================================
// 医生排班系统 - RosterStore 的 SQLite 实现
// ==========================================
// 职责: 组合各仓储, 共享同一数据库连接
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::calendar::MonthConfig;
use crate::domain::physician::Physician;
use crate::domain::roster::DayAssignment;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::day_assignment_repo::DayAssignmentRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::month_config_repo::MonthConfigRepository;
use crate::repository::physician_repo::PhysicianRepository;
use crate::repository::roster_store::RosterStore;
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// SqliteRosterStore
// ==========================================
pub struct SqliteRosterStore {
    conn: Arc<Mutex<Connection>>,
    physicians: PhysicianRepository,
    days: DayAssignmentRepository,
    config: MonthConfigRepository,
}

impl SqliteRosterStore {
    /// 打开数据库文件并确保表结构存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建（幂等建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            init_schema(&guard)?;
        }

        Ok(Self {
            physicians: PhysicianRepository::new(conn.clone()),
            days: DayAssignmentRepository::new(conn.clone()),
            config: MonthConfigRepository::new(conn.clone()),
            conn,
        })
    }

    /// 共享连接（供配置管理器、操作日志仓储复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// 基于同一连接创建操作日志仓储
    pub fn action_log_repo(&self) -> ActionLogRepository {
        ActionLogRepository::new(self.conn.clone())
    }
}

#[async_trait]
impl RosterStore for SqliteRosterStore {
    async fn load_physicians(&self) -> RepositoryResult<Vec<Physician>> {
        self.physicians.list_all()
    }

    async fn save_physicians(&self, physicians: &[Physician]) -> RepositoryResult<()> {
        let count = self.physicians.save_all(physicians)?;
        debug!(count, "医生名单已保存");
        Ok(())
    }

    async fn load_month_roster(&self) -> RepositoryResult<Vec<DayAssignment>> {
        self.days.list_all()
    }

    async fn save_month_roster(&self, days: &[DayAssignment]) -> RepositoryResult<()> {
        let count = self.days.upsert_all(days)?;
        debug!(count, "日排班已保存");
        Ok(())
    }

    async fn load_config(&self) -> RepositoryResult<Option<MonthConfig>> {
        self.config.load()
    }

    async fn save_config(&self, config: &MonthConfig) -> RepositoryResult<()> {
        self.config.save(config)
    }
}
