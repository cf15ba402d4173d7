// ==========================================
// 医生排班系统 - 应用层
// ==========================================
// 职责: 资源装配, 连接命令行与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
