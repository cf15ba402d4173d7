// ==========================================
// 医生排班系统 - 手工编辑级联
// ==========================================
// 职责: 写入单个格子, 并按约束模型在当天内级联
// - 节假日 普通早班 → 同时写 ICU午班、ICU夜班 (模式A)
// - 节假日 ICU早班  → 同时写 普通午班、普通夜班 (模式B)
// - 午班/<病区>     → 同时写 夜班/<病区>
// - 夜班            → 不级联
// ==========================================
// 红线: 只做局部修复, 不重新校验整月, 永不失败
// 红线: 不触碰指定日期以外的任何一天
// 红线: 病区冲突、不可用等问题仅作为提示返回, 不阻断编辑
// ==========================================

use crate::domain::physician::{Physician, PhysicianDirectory};
use crate::domain::roster::{DayAssignment, MonthRoster};
use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use crate::engine::evaluator::{ConstraintEvaluator, ViolationKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ==========================================
// EditWarning - 提示性警告
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditWarningKind {
    /// 当天硬约束违规
    Constraint(ViolationKind),
    /// 写入的医生ID不在名单中
    StaleReference,
    /// 日期不属于当前月份, 编辑未生效
    DateOutsideMonth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditWarning {
    pub kind: EditWarningKind,
    pub message: String,
}

// ==========================================
// EditOutcome - 编辑结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOutcome {
    pub date: NaiveDate,
    /// 实际写入的格子（含级联）
    pub written: Vec<SlotKey>,
    /// 是否有格子内容发生变化
    pub changed: bool,
    pub warnings: Vec<EditWarning>,
}

impl EditOutcome {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ==========================================
// EditCascade - 手工编辑级联
// ==========================================
pub struct EditCascade {
    evaluator: ConstraintEvaluator,
}

impl EditCascade {
    pub fn new() -> Self {
        Self {
            evaluator: ConstraintEvaluator::new(),
        }
    }

    /// 计算一次编辑需要写入的格子（目标格子在前）
    pub fn cascade_targets(day: &DayAssignment, key: SlotKey) -> Vec<SlotKey> {
        match key.period {
            ShiftPeriod::Morning if day.is_holiday => vec![
                key,
                SlotKey::new(ShiftPeriod::Afternoon, key.ward.other()),
                SlotKey::new(ShiftPeriod::Night, key.ward.other()),
            ],
            ShiftPeriod::Morning => vec![key],
            ShiftPeriod::Afternoon => vec![key, SlotKey::new(ShiftPeriod::Night, key.ward)],
            ShiftPeriod::Night => vec![key],
        }
    }

    /// 应用单格编辑
    ///
    /// # 参数
    /// - `roster`: 月度排班（原地修改）
    /// - `date`: 编辑日期
    /// - `period` / `ward`: 目标格子
    /// - `physician_id`: 写入的医生; None 表示清空（同样级联）
    /// - `physicians`: 医生名单, 仅用于生成提示
    ///
    /// # 返回
    /// 写入的格子与提示性警告; 永不失败
    pub fn apply_edit(
        &self,
        roster: &mut MonthRoster,
        date: NaiveDate,
        period: ShiftPeriod,
        ward: Ward,
        physician_id: Option<String>,
        physicians: &[Physician],
    ) -> EditOutcome {
        let key = SlotKey::new(period, ward);
        let Some(day) = roster.day_mut(date) else {
            return EditOutcome {
                date,
                written: Vec::new(),
                changed: false,
                warnings: vec![EditWarning {
                    kind: EditWarningKind::DateOutsideMonth,
                    message: format!(
                        "{} 不属于 {}-{:02}, 编辑未生效",
                        date, roster.year, roster.month
                    ),
                }],
            };
        };

        let targets = Self::cascade_targets(day, key);
        let mut changed = false;
        for target in &targets {
            if day.slot(*target) != physician_id.as_deref() {
                changed = true;
            }
            day.set_slot(*target, physician_id.clone());
        }

        debug!(
            date = %date,
            slot = %key,
            physician_id = physician_id.as_deref().unwrap_or("-"),
            cascade = targets.len() - 1,
            "单格编辑已应用"
        );

        let directory = PhysicianDirectory::new(physicians);
        let mut warnings = Vec::new();

        if let Some(id) = physician_id.as_deref() {
            if directory.lookup(id).is_stale() {
                warnings.push(EditWarning {
                    kind: EditWarningKind::StaleReference,
                    message: format!("医生 {} 不在当前名单中", id),
                });
            }
        }

        for violation in self.evaluator.check_day(day, &directory) {
            let touches_target = violation.slots.iter().any(|s| targets.contains(s));
            let same_physician = physician_id.is_some()
                && violation.physician_id.as_deref() == physician_id.as_deref();
            if touches_target || same_physician {
                warnings.push(EditWarning {
                    kind: EditWarningKind::Constraint(violation.kind),
                    message: violation.reason,
                });
            }
        }

        EditOutcome {
            date,
            written: targets,
            changed,
            warnings,
        }
    }
}

impl Default for EditCascade {
    fn default() -> Self {
        Self::new()
    }
}
