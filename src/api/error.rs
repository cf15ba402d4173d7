// ==========================================
// 医生排班系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把下层错误转换为用户可读的错误消息
// 红线: 错误信息必须包含显式原因
// ==========================================

use crate::engine::generator::GenerationError;
use crate::repository::error::RepositoryError;
use crate::sync::SyncError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 权限错误
    // ==========================================
    #[error("无权限: {0}")]
    PermissionDenied(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 操作期间会话已切换月份或修改了节假日, 结果已丢弃
    #[error("操作冲突: {0}")]
    Conflict(String),

    /// 自动排班失败（在岗不足 / 无可行解 / 配置无效）
    #[error("自动排班失败: {0}")]
    Generation(#[from] GenerationError),

    // ==========================================
    // 持久化错误
    // ==========================================
    /// 排班保存失败; 未保存的修改仍保留在内存中
    #[error("保存失败, 未保存的修改已保留: {0}")]
    PersistenceFailure(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::LockError(msg) => {
                ApiError::InternalError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// ==========================================
// 从 SyncError 转换
// ==========================================
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::PersistenceFailure(msg) => ApiError::PersistenceFailure(msg),
            err @ SyncError::MonthMismatch { .. } => ApiError::Conflict(err.to_string()),
            err @ SyncError::UnsavedChanges(_) => ApiError::Conflict(err.to_string()),
            SyncError::LockError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
