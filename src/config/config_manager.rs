// ==========================================
// 医生排班系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::generator::{GenerationSettings, DEFAULT_MAX_BACKTRACKS};
use crate::engine::ranking::RankingCriterion;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::sync::{SyncSettings, DEFAULT_DEBOUNCE_MS};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// 配置作用域（目前只使用 global）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Global => "global",
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![ConfigScope::Global.as_str(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RepositoryError::ValidationError("配置键不能为空".to_string()));
        }

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![ConfigScope::Global.as_str(), key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式, 按键排序）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![ConfigScope::Global.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 排班生成配置 =====

    /// 读取候选排序准则顺序
    ///
    /// 配置格式为 JSON 数组: ["rested", "fewest_shifts", ...]
    /// 格式错误或为空时回退默认顺序
    pub fn get_ranking_order(&self) -> RepositoryResult<Vec<RankingCriterion>> {
        let Some(raw) = self.get_global_config_value(config_keys::RANKING_ORDER)? else {
            return Ok(RankingCriterion::default_order());
        };

        let parsed: Result<Vec<String>, _> = serde_json::from_str(&raw);
        let order = parsed
            .map_err(|e| e.to_string())
            .and_then(|names| {
                names
                    .iter()
                    .map(|n| n.parse::<RankingCriterion>())
                    .collect::<Result<Vec<_>, _>>()
            });

        match order {
            Ok(order) if !order.is_empty() => Ok(order),
            Ok(_) => Ok(RankingCriterion::default_order()),
            Err(e) => {
                warn!(
                    config_key = config_keys::RANKING_ORDER,
                    raw_value = %raw,
                    error = %e,
                    "排序准则配置格式错误，使用默认顺序"
                );
                Ok(RankingCriterion::default_order())
            }
        }
    }

    /// 是否禁止连续两天上班（硬约束）
    pub fn get_forbid_consecutive_days(&self) -> RepositoryResult<bool> {
        let value = self.get_config_or_default(config_keys::FORBID_CONSECUTIVE_DAYS, "false")?;
        Ok(matches!(
            value.trim().to_lowercase().as_str(),
            "true" | "1" | "yes"
        ))
    }

    /// 回溯次数上限
    pub fn get_max_backtracks(&self) -> RepositoryResult<u64> {
        let default = DEFAULT_MAX_BACKTRACKS.to_string();
        let value = self.get_config_or_default(config_keys::MAX_BACKTRACKS, &default)?;
        Ok(value.trim().parse::<u64>().unwrap_or(DEFAULT_MAX_BACKTRACKS))
    }

    /// 组装排班生成参数
    pub fn load_generation_settings(&self) -> RepositoryResult<GenerationSettings> {
        Ok(GenerationSettings {
            ranking_order: self.get_ranking_order()?,
            forbid_consecutive_days: self.get_forbid_consecutive_days()?,
            max_backtracks: self.get_max_backtracks()?,
        })
    }

    // ===== 自动保存配置 =====

    /// 组装自动保存参数（防抖毫秒数）
    pub fn load_sync_settings(&self) -> RepositoryResult<SyncSettings> {
        let default = DEFAULT_DEBOUNCE_MS.to_string();
        let value = self.get_config_or_default(config_keys::SYNC_DEBOUNCE_MS, &default)?;
        let ms = value.trim().parse::<u64>().unwrap_or(DEFAULT_DEBOUNCE_MS);
        Ok(SyncSettings {
            debounce: Duration::from_millis(ms),
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 排班生成
    pub const RANKING_ORDER: &str = "roster.ranking_order"; // 排序准则顺序 (JSON)
    pub const FORBID_CONSECUTIVE_DAYS: &str = "roster.forbid_consecutive_days";
    pub const MAX_BACKTRACKS: &str = "roster.max_backtracks";

    // 自动保存
    pub const SYNC_DEBOUNCE_MS: &str = "sync.debounce_ms";
}
