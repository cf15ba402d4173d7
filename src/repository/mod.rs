// ==========================================
// 医生排班系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod day_assignment_repo;
pub mod error;
pub mod month_config_repo;
pub mod physician_repo;
pub mod roster_store;
pub mod sqlite_store;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use day_assignment_repo::DayAssignmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use month_config_repo::MonthConfigRepository;
pub use physician_repo::PhysicianRepository;
pub use roster_store::RosterStore;
pub use sqlite_store::SqliteRosterStore;
