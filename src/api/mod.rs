// ==========================================
// 医生排班系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行 / 上层界面调用
// 红线: 角色门禁在此层执行
// ==========================================

pub mod auth;
pub mod error;
pub mod export;
pub mod physician_api;
pub mod roster_api;

// 重导出核心类型
pub use auth::{AuthenticatedUser, Authenticator, Credentials, StaticAuthenticator};
pub use error::{ApiError, ApiResult};
pub use export::{ExportCell, ExportRow, RosterExport};
pub use physician_api::PhysicianApi;
pub use roster_api::RosterApi;
