// ==========================================
// 医生排班系统 - 操作日志数据仓储
// ==========================================
// 存储: action_log 表
// 红线: 所有排班写入必须记录
// ==========================================

mod core;
mod queries;


pub use self::core::ActionLogRepository;
