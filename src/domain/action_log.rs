// ==========================================
// 医生排班系统 - 操作日志领域模型
// ==========================================
// 红线: 所有排班写入必须记录
// 用途: 审计追踪
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID
    pub action_type: String,      // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)

    pub target_date: Option<NaiveDate>, // 影响日期（单格编辑）
    pub year: Option<i32>,              // 影响月份
    pub month: Option<u32>,
    pub detail: Option<String>, // 详细描述
}

impl ActionLog {
    /// 创建新的操作日志（时间戳取当前 UTC）
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            action_ts: Utc::now().naive_utc(),
            actor: actor.to_string(),
            payload_json: None,
            target_date: None,
            year: None,
            month: None,
            detail: None,
        }
    }

    pub fn with_month(mut self, year: i32, month: u32) -> Self {
        self.year = Some(year);
        self.month = Some(month);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    GenerateRoster, // 整月生成
    EditCell,       // 单格编辑
    UpdateHolidays, // 节假日配置
    SwitchMonth,    // 切换月份
    DiscardPending, // 放弃未保存修改
    ManagePhysician, // 医生档案维护
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::GenerateRoster => "GENERATE_ROSTER",
            ActionType::EditCell => "EDIT_CELL",
            ActionType::UpdateHolidays => "UPDATE_HOLIDAYS",
            ActionType::SwitchMonth => "SWITCH_MONTH",
            ActionType::DiscardPending => "DISCARD_PENDING",
            ActionType::ManagePhysician => "MANAGE_PHYSICIAN",
        };
        write!(f, "{}", s)
    }
}
