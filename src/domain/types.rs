// ==========================================
// 医生排班系统 - 领域类型定义
// ==========================================
// 病区、班次、排班格子坐标、用户角色
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 病区 (Ward)
// ==========================================
// 固定两值枚举,不可由用户扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ward {
    Icu,     // 重症监护病区
    General, // 普通病区
}

impl Ward {
    /// 全部病区（固定顺序: 普通 → ICU）
    pub const ALL: [Ward; 2] = [Ward::General, Ward::Icu];

    /// 另一个病区
    pub fn other(&self) -> Ward {
        match self {
            Ward::Icu => Ward::General,
            Ward::General => Ward::Icu,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Ward::Icu => "ICU",
            Ward::General => "GENERAL",
        }
    }

    /// 从字符串解析病区
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ICU" => Some(Ward::Icu),
            "GENERAL" => Some(Ward::General),
            _ => None,
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            Ward::Icu => "ICU",
            Ward::General => "普通病区",
        }
    }
}

impl fmt::Display for Ward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 班次 (Shift Period)
// ==========================================
// 早班仅在节假日存在; 午班、夜班每天都有
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftPeriod {
    Morning,   // 早班
    Afternoon, // 午班
    Night,     // 夜班
}

impl ShiftPeriod {
    pub const ALL: [ShiftPeriod; 3] =
        [ShiftPeriod::Morning, ShiftPeriod::Afternoon, ShiftPeriod::Night];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShiftPeriod::Morning => "MORNING",
            ShiftPeriod::Afternoon => "AFTERNOON",
            ShiftPeriod::Night => "NIGHT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MORNING" => Some(ShiftPeriod::Morning),
            "AFTERNOON" => Some(ShiftPeriod::Afternoon),
            "NIGHT" => Some(ShiftPeriod::Night),
            _ => None,
        }
    }

    pub fn title_cn(&self) -> &'static str {
        match self {
            ShiftPeriod::Morning => "早班",
            ShiftPeriod::Afternoon => "午班",
            ShiftPeriod::Night => "夜班",
        }
    }
}

impl fmt::Display for ShiftPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 排班格子坐标 (Slot Key)
// ==========================================
// 一天最多 6 个格子: {早, 午, 夜} × {ICU, 普通}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub period: ShiftPeriod,
    pub ward: Ward,
}

impl SlotKey {
    pub const fn new(period: ShiftPeriod, ward: Ward) -> Self {
        Self { period, ward }
    }

    /// 全部 6 个格子（按 早/午/夜 × 普通/ICU 的固定顺序）
    pub fn all() -> [SlotKey; 6] {
        [
            SlotKey::new(ShiftPeriod::Morning, Ward::General),
            SlotKey::new(ShiftPeriod::Morning, Ward::Icu),
            SlotKey::new(ShiftPeriod::Afternoon, Ward::General),
            SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu),
            SlotKey::new(ShiftPeriod::Night, Ward::General),
            SlotKey::new(ShiftPeriod::Night, Ward::Icu),
        ]
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.period, self.ward)
    }
}

// ==========================================
// 用户角色 (User Role)
// ==========================================
// 鉴权由外部协作方完成; 这里只承载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,  // 管理员
    Editor, // 排班编辑
    Viewer, // 只读
}

impl UserRole {
    /// 是否允许修改排班（生成 / 手工编辑 / 节假日配置）
    pub fn can_edit_roster(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Editor)
    }

    /// 是否允许维护医生档案
    pub fn can_manage_physicians(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Editor => "EDITOR",
            UserRole::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
