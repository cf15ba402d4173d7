// ==========================================
// 医生排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、不变量相关的基础操作
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod calendar;
pub mod physician;
pub mod roster;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use calendar::{CustomHoliday, HolidayInfo, MonthConfig};
pub use physician::{Physician, PhysicianDirectory, PhysicianLookup};
pub use roster::{DayAssignment, MonthRoster, WardSlots};
pub use types::{ShiftPeriod, SlotKey, UserRole, Ward};
