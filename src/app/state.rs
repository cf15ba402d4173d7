// ==========================================
// 医生排班系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享资源, 创建 API 实例
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ApiResult, AuthenticatedUser, PhysicianApi, RosterApi};
use crate::config::config_manager::ConfigManager;
use crate::repository::{ActionLogRepository, RosterStore, SqliteRosterStore};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "ROSTER_DB_PATH";

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排班存储
    pub store: Arc<SqliteRosterStore>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例（打开数据库并建表）
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let store = SqliteRosterStore::open(&db_path)?;
        let conn = store.connection();
        let config_manager = ConfigManager::from_connection(conn)?;
        let action_log_repo = store.action_log_repo();

        Ok(Self {
            db_path,
            store: Arc::new(store),
            config_manager: Arc::new(config_manager),
            action_log_repo: Arc::new(action_log_repo),
        })
    }

    fn dyn_store(&self) -> Arc<dyn RosterStore> {
        self.store.clone()
    }

    /// 打开排班编辑会话
    pub async fn open_roster_session(&self, user: AuthenticatedUser) -> ApiResult<RosterApi> {
        let api = RosterApi::open(self.dyn_store(), self.config_manager.clone(), user).await?;
        Ok(api.with_action_log(self.action_log_repo.clone()))
    }

    /// 医生名单管理 API
    pub fn physician_api(&self, user: AuthenticatedUser) -> PhysicianApi {
        PhysicianApi::new(self.dyn_store(), user).with_action_log(self.action_log_repo.clone())
    }
}

/// 默认数据库路径
///
/// 优先使用环境变量 ROSTER_DB_PATH, 否则放在用户本地数据目录
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./roster.db");
    if let Some(data_dir) = dirs::data_local_dir() {
        let dir = data_dir.join("physician-roster");
        // best-effort: 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("roster.db");
        }
    }
    path.to_string_lossy().to_string()
}
