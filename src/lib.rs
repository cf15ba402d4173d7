// ==========================================
// 医生排班系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 排班引擎 + 自动保存同步 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 约束校验 / 自动排班 / 编辑级联
pub mod engine;

// 同步层 - 脏状态跟踪与防抖保存
pub mod sync;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 资源装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型与实体
pub use domain::{
    ActionLog, ActionType, CustomHoliday, DayAssignment, MonthConfig, MonthRoster, Physician,
    PhysicianLookup, ShiftPeriod, SlotKey, UserRole, Ward, WardSlots,
};

// 引擎
pub use engine::{
    ConstraintEvaluator, EditCascade, EvaluationReport, GenerationError, RosterGenerator,
};

// 同步
pub use sync::{PersistenceSynchronizer, SyncError, SyncState};

// API
pub use api::{ApiError, PhysicianApi, RosterApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "医生排班系统";
