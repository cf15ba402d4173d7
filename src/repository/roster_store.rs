// ==========================================
// 医生排班系统 - 排班存储 Trait
// ==========================================
// 职责: 定义排班核心所依赖的持久化协作接口（不包含实现）
// 红线: 不包含业务逻辑; 月份过滤由调用方完成
// ==========================================

use crate::domain::calendar::MonthConfig;
use crate::domain::physician::Physician;
use crate::domain::roster::DayAssignment;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// RosterStore Trait
// ==========================================
// 实现者: SqliteRosterStore（rusqlite）; 测试中可替换为内存替身
#[async_trait]
pub trait RosterStore: Send + Sync {
    // ===== 医生名单 =====

    /// 读取医生名单（名单顺序即排班平局顺序）
    async fn load_physicians(&self) -> RepositoryResult<Vec<Physician>>;

    /// 保存医生名单（upsert, 不删除）
    async fn save_physicians(&self, physicians: &[Physician]) -> RepositoryResult<()>;

    // ===== 日排班 =====

    /// 读取全部历史日排班
    async fn load_month_roster(&self) -> RepositoryResult<Vec<DayAssignment>>;

    /// 按日期 upsert 日排班
    ///
    /// # 返回
    /// - Err: 写入失败, 不得部分生效
    async fn save_month_roster(&self, days: &[DayAssignment]) -> RepositoryResult<()>;

    // ===== 月度配置 =====

    /// 读取月度配置（从未保存时返回 None）
    async fn load_config(&self) -> RepositoryResult<Option<MonthConfig>>;

    /// 保存月度配置
    async fn save_config(&self, config: &MonthConfig) -> RepositoryResult<()>;
}
