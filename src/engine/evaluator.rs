// ==========================================
// 医生排班系统 - 约束校验引擎
// ==========================================
// 职责: 给定整月排班, 输出违反的硬约束 + 公平性报告
// 红线: 纯函数, 无副作用, 不抛错
// ==========================================
// 硬约束:
// - 病区冲突: 同一班次两个病区不能是同一医生
// - 连续性: 同一病区同一天 午班 = 夜班 (连续性)
// - 节假日跨病区链: 普通早班 = ICU午/夜; ICU早班 = 普通午/夜
// - 可用性: 不可排班日期 / 停岗医生不得出现在排班中
// - 工作日不得有早班
// 各天之间相互独立, 仅通过公平性相互关联
// ==========================================

use crate::domain::physician::{Physician, PhysicianDirectory, PhysicianLookup};
use crate::domain::roster::{DayAssignment, MonthRoster};
use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::instrument;

// ==========================================
// ViolationKind - 违规类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    WardConflict,          // 同班次跨病区重复
    ContinuityBroken,      // 午班 ≠ 夜班
    CrossWardChainBroken,  // 节假日跨病区链断开
    PhysicianUnavailable,  // 不可排班日期
    PhysicianInactive,     // 停岗医生
    MorningOnWorkday,      // 工作日出现早班
    InsufficientStaff,     // 可用医生不足 2 人
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::WardConflict => "WARD_CONFLICT",
            ViolationKind::ContinuityBroken => "CONTINUITY_BROKEN",
            ViolationKind::CrossWardChainBroken => "CROSS_WARD_CHAIN_BROKEN",
            ViolationKind::PhysicianUnavailable => "PHYSICIAN_UNAVAILABLE",
            ViolationKind::PhysicianInactive => "PHYSICIAN_INACTIVE",
            ViolationKind::MorningOnWorkday => "MORNING_ON_WORKDAY",
            ViolationKind::InsufficientStaff => "INSUFFICIENT_STAFF",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// Violation - 单条违规
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// 违规日期; 整月级别违规为 None
    pub date: Option<NaiveDate>,
    pub physician_id: Option<String>,
    pub slots: Vec<SlotKey>,
    pub reason: String,
}

impl Violation {
    fn on_day(kind: ViolationKind, date: NaiveDate, reason: String) -> Self {
        Self {
            kind,
            date: Some(date),
            physician_id: None,
            slots: Vec::new(),
            reason,
        }
    }

    fn with_physician(mut self, physician_id: &str) -> Self {
        self.physician_id = Some(physician_id.to_string());
        self
    }

    fn with_slots(mut self, slots: Vec<SlotKey>) -> Self {
        self.slots = slots;
        self
    }
}

/// 引用了已不在名单中的医生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleReference {
    pub date: NaiveDate,
    pub slot: SlotKey,
    pub physician_id: String,
}

/// 未排人的格子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncoveredSlot {
    pub date: NaiveDate,
    pub slot: SlotKey,
}

// ==========================================
// 公平性报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicianLoad {
    pub physician_id: String,
    pub name: String,
    pub total_shifts: u32,   // 占用格子数 (每格计 1 班)
    pub holiday_shifts: u32, // 节假日占用格子数
    pub icu_shifts: u32,
    pub general_shifts: u32,
    pub worked_days: u32,
    /// 存在相邻两天都上班
    pub consecutive_days: bool,
    /// 相邻上班的第二天
    pub consecutive_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    /// 在岗医生负荷, 按名单顺序
    pub loads: Vec<PhysicianLoad>,
    /// 总班次 最大 - 最小
    pub total_spread: u32,
    /// 节假日班次 最大 - 最小
    pub holiday_spread: u32,
    /// 存在连续上班的医生人数
    pub consecutive_physicians: usize,
    /// 总班次标准差, 越小越公平
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub violations: Vec<Violation>,
    pub uncovered_slots: Vec<UncoveredSlot>,
    pub stale_references: Vec<StaleReference>,
    pub fairness: FairnessReport,
}

impl EvaluationReport {
    /// 无硬约束违规
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// 无硬约束违规且全部格子已排
    pub fn is_complete(&self) -> bool {
        self.is_valid() && self.uncovered_slots.is_empty()
    }

    pub fn violations_of(&self, kind: ViolationKind) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }
}

// ==========================================
// ConstraintEvaluator - 约束校验引擎
// ==========================================
pub struct ConstraintEvaluator {
    // 无状态引擎
}

impl ConstraintEvaluator {
    pub fn new() -> Self {
        Self {}
    }

    /// 校验整月排班
    ///
    /// # 参数
    /// - `roster`: 月度排班
    /// - `physicians`: 当前医生名单（含停岗医生, 用于可用性判定）
    ///
    /// # 返回
    /// 违规列表 + 未排格子 + 失效引用 + 公平性报告
    #[instrument(skip(self, roster, physicians), fields(
        year = roster.year,
        month = roster.month,
        physicians = physicians.len()
    ))]
    pub fn evaluate(&self, roster: &MonthRoster, physicians: &[Physician]) -> EvaluationReport {
        let directory = PhysicianDirectory::new(physicians);
        let mut violations = Vec::new();
        let mut uncovered_slots = Vec::new();
        let mut stale_references = Vec::new();

        let active_count = physicians.iter().filter(|p| p.active).count();
        if active_count < 2 {
            violations.push(Violation {
                kind: ViolationKind::InsufficientStaff,
                date: None,
                physician_id: None,
                slots: Vec::new(),
                reason: format!("在岗医生仅 {} 人, 至少需要 2 人", active_count),
            });
        }

        for day in &roster.days {
            violations.extend(self.check_day(day, &directory));

            if active_count >= 2 {
                let eligible = physicians
                    .iter()
                    .filter(|p| p.is_available_on(day.date))
                    .count();
                if eligible < 2 {
                    violations.push(Violation::on_day(
                        ViolationKind::InsufficientStaff,
                        day.date,
                        format!("{} 可排班医生仅 {} 人", day.date, eligible),
                    ));
                }
            }

            for key in required_slots(day) {
                if day.slot(key).is_none() {
                    uncovered_slots.push(UncoveredSlot {
                        date: day.date,
                        slot: key,
                    });
                }
            }

            for (key, id) in day.occupied() {
                if directory.lookup(id).is_stale() {
                    stale_references.push(StaleReference {
                        date: day.date,
                        slot: key,
                        physician_id: id.to_string(),
                    });
                }
            }
        }

        let fairness = self.fairness(roster, physicians);

        tracing::debug!(
            violations = violations.len(),
            uncovered = uncovered_slots.len(),
            stale = stale_references.len(),
            score = fairness.score,
            "排班校验完成"
        );

        EvaluationReport {
            violations,
            uncovered_slots,
            stale_references,
            fairness,
        }
    }

    /// 校验单日全部硬约束
    ///
    /// 编辑级联复用此方法生成提示性警告
    pub fn check_day(&self, day: &DayAssignment, directory: &PhysicianDirectory) -> Vec<Violation> {
        let mut out = Vec::new();
        let date = day.date;

        // 同班次跨病区
        for period in ShiftPeriod::ALL {
            let general = day.slot(SlotKey::new(period, Ward::General));
            let icu = day.slot(SlotKey::new(period, Ward::Icu));
            if let (Some(g), Some(i)) = (general, icu) {
                if g == i {
                    out.push(
                        Violation::on_day(
                            ViolationKind::WardConflict,
                            date,
                            format!("{} {} 同一医生同时在两个病区", date, period.title_cn()),
                        )
                        .with_physician(g)
                        .with_slots(vec![
                            SlotKey::new(period, Ward::General),
                            SlotKey::new(period, Ward::Icu),
                        ]),
                    );
                }
            }
        }

        // 连续性
        for ward in Ward::ALL {
            let afternoon = day.slot(SlotKey::new(ShiftPeriod::Afternoon, ward));
            let night = day.slot(SlotKey::new(ShiftPeriod::Night, ward));
            if afternoon != night {
                out.push(
                    Violation::on_day(
                        ViolationKind::ContinuityBroken,
                        date,
                        format!(
                            "{} {} 午班({}) 与夜班({}) 不一致",
                            date,
                            ward.title_cn(),
                            afternoon.unwrap_or("空"),
                            night.unwrap_or("空")
                        ),
                    )
                    .with_slots(vec![
                        SlotKey::new(ShiftPeriod::Afternoon, ward),
                        SlotKey::new(ShiftPeriod::Night, ward),
                    ]),
                );
            }
        }

        // 节假日跨病区链 / 工作日早班
        if day.is_holiday {
            for morning_ward in Ward::ALL {
                let Some(owner) = day.slot(SlotKey::new(ShiftPeriod::Morning, morning_ward)) else {
                    continue;
                };
                let chained = morning_ward.other();
                let chain = [
                    SlotKey::new(ShiftPeriod::Afternoon, chained),
                    SlotKey::new(ShiftPeriod::Night, chained),
                ];
                let broken: Vec<SlotKey> = chain
                    .into_iter()
                    .filter(|k| day.slot(*k) != Some(owner))
                    .collect();
                if !broken.is_empty() {
                    out.push(
                        Violation::on_day(
                            ViolationKind::CrossWardChainBroken,
                            date,
                            format!(
                                "{} {}早班医生须同时承担{}午班与夜班",
                                date,
                                morning_ward.title_cn(),
                                chained.title_cn()
                            ),
                        )
                        .with_physician(owner)
                        .with_slots(broken),
                    );
                }
            }
        } else if day.morning.as_ref().is_some_and(|m| !m.is_empty()) {
            out.push(
                Violation::on_day(
                    ViolationKind::MorningOnWorkday,
                    date,
                    format!("{} 非节假日不应排早班", date),
                )
                .with_slots(vec![
                    SlotKey::new(ShiftPeriod::Morning, Ward::General),
                    SlotKey::new(ShiftPeriod::Morning, Ward::Icu),
                ]),
            );
        }

        // 可用性（同一医生同一天只报一次）
        let mut by_physician: Vec<(&str, Vec<SlotKey>)> = Vec::new();
        for (key, id) in day.occupied() {
            match by_physician.iter_mut().find(|(pid, _)| *pid == id) {
                Some((_, slots)) => slots.push(key),
                None => by_physician.push((id, vec![key])),
            }
        }
        for (id, slots) in by_physician {
            let PhysicianLookup::Found(physician) = directory.lookup(id) else {
                continue;
            };
            if !physician.active {
                out.push(
                    Violation::on_day(
                        ViolationKind::PhysicianInactive,
                        date,
                        format!("{} 医生 {} 已停岗", date, physician.name),
                    )
                    .with_physician(id)
                    .with_slots(slots),
                );
            } else if physician.unavailable_dates.contains(&date) {
                out.push(
                    Violation::on_day(
                        ViolationKind::PhysicianUnavailable,
                        date,
                        format!("{} 医生 {} 不可排班", date, physician.name),
                    )
                    .with_physician(id)
                    .with_slots(slots),
                );
            }
        }

        out
    }

    /// 公平性统计（仅在岗医生）
    pub fn fairness(&self, roster: &MonthRoster, physicians: &[Physician]) -> FairnessReport {
        let active: Vec<&Physician> = physicians.iter().filter(|p| p.active).collect();
        let index: HashMap<&str, usize> = active
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.as_str(), i))
            .collect();

        let mut loads: Vec<PhysicianLoad> = active
            .iter()
            .map(|p| PhysicianLoad {
                physician_id: p.id.clone(),
                name: p.name.clone(),
                total_shifts: 0,
                holiday_shifts: 0,
                icu_shifts: 0,
                general_shifts: 0,
                worked_days: 0,
                consecutive_days: false,
                consecutive_dates: Vec::new(),
            })
            .collect();
        let mut worked: Vec<BTreeSet<NaiveDate>> = vec![BTreeSet::new(); active.len()];

        for day in &roster.days {
            for (key, id) in day.occupied() {
                let Some(&i) = index.get(id) else {
                    continue;
                };
                let load = &mut loads[i];
                load.total_shifts += 1;
                if day.is_holiday {
                    load.holiday_shifts += 1;
                }
                match key.ward {
                    Ward::Icu => load.icu_shifts += 1,
                    Ward::General => load.general_shifts += 1,
                }
                worked[i].insert(day.date);
            }
        }

        for (load, dates) in loads.iter_mut().zip(worked.iter()) {
            load.worked_days = dates.len() as u32;
            load.consecutive_dates = dates
                .iter()
                .filter(|d| d.pred_opt().is_some_and(|prev| dates.contains(&prev)))
                .copied()
                .collect();
            load.consecutive_days = !load.consecutive_dates.is_empty();
        }

        let spread = |f: fn(&PhysicianLoad) -> u32| -> u32 {
            let max = loads.iter().map(f).max().unwrap_or(0);
            let min = loads.iter().map(f).min().unwrap_or(0);
            max - min
        };
        let total_spread = spread(|l| l.total_shifts);
        let holiday_spread = spread(|l| l.holiday_shifts);
        let consecutive_physicians = loads.iter().filter(|l| l.consecutive_days).count();

        let score = if loads.is_empty() {
            0.0
        } else {
            let n = loads.len() as f64;
            let mean = loads.iter().map(|l| l.total_shifts as f64).sum::<f64>() / n;
            let variance = loads
                .iter()
                .map(|l| (l.total_shifts as f64 - mean).powi(2))
                .sum::<f64>()
                / n;
            variance.sqrt()
        };

        FairnessReport {
            loads,
            total_spread,
            holiday_spread,
            consecutive_physicians,
            score,
        }
    }
}

impl Default for ConstraintEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// 当天必须排人的格子: 节假日 6 格, 工作日只有午/夜 4 格
fn required_slots(day: &DayAssignment) -> Vec<SlotKey> {
    SlotKey::all()
        .into_iter()
        .filter(|k| day.is_holiday || k.period != ShiftPeriod::Morning)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::MonthConfig;

    fn physicians(n: usize) -> Vec<Physician> {
        (0..n)
            .map(|i| {
                let mut p = Physician::new(&format!("医生{}", i), "", "");
                p.id = format!("P{}", i);
                p
            })
            .collect()
    }

    fn set(day: &mut DayAssignment, period: ShiftPeriod, ward: Ward, id: &str) {
        day.set_slot(SlotKey::new(period, ward), Some(id.to_string()));
    }

    #[test]
    fn test_blank_roster_has_no_violations_but_is_uncovered() {
        let roster = MonthRoster::blank(&MonthConfig::new(2025, 3));
        let report = ConstraintEvaluator::new().evaluate(&roster, &physicians(3));
        assert!(report.is_valid());
        assert!(!report.is_complete());
        // 2025-03: 10 个周末日, 21 个工作日
        assert_eq!(report.uncovered_slots.len(), 10 * 6 + 21 * 4);
    }

    #[test]
    fn test_check_day_detects_each_invariant() {
        let config = MonthConfig::new(2025, 3);
        let mut roster = MonthRoster::blank(&config);
        let mut staff = physicians(3);
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        staff[2].mark_unavailable(monday);

        let day = roster.day_mut(monday).unwrap();
        set(day, ShiftPeriod::Afternoon, Ward::General, "P0");
        set(day, ShiftPeriod::Afternoon, Ward::Icu, "P0");
        set(day, ShiftPeriod::Night, Ward::General, "P2");
        set(day, ShiftPeriod::Morning, Ward::Icu, "P1");

        let report = ConstraintEvaluator::new().evaluate(&roster, &staff);
        let kinds: BTreeSet<String> = report.violations.iter().map(|v| v.kind.to_string()).collect();
        assert!(kinds.contains("WARD_CONFLICT"));
        assert!(kinds.contains("CONTINUITY_BROKEN"));
        assert!(kinds.contains("PHYSICIAN_UNAVAILABLE"));
        assert!(kinds.contains("MORNING_ON_WORKDAY"));
    }

    #[test]
    fn test_insufficient_staff_reported_not_thrown() {
        let roster = MonthRoster::blank(&MonthConfig::new(2025, 3));
        let report = ConstraintEvaluator::new().evaluate(&roster, &physicians(1));
        let insufficient = report.violations_of(ViolationKind::InsufficientStaff);
        assert_eq!(insufficient.len(), 1);
        assert!(insufficient[0].date.is_none());
    }

    #[test]
    fn test_fairness_counts_slots_and_consecutive_days() {
        let config = MonthConfig::new(2025, 3);
        let mut roster = MonthRoster::blank(&config);
        let staff = physicians(2);
        for d in [3, 4] {
            let date = NaiveDate::from_ymd_opt(2025, 3, d).unwrap();
            let day = roster.day_mut(date).unwrap();
            set(day, ShiftPeriod::Afternoon, Ward::General, "P0");
            set(day, ShiftPeriod::Night, Ward::General, "P0");
        }

        let fairness = ConstraintEvaluator::new().fairness(&roster, &staff);
        let p0 = &fairness.loads[0];
        assert_eq!(p0.total_shifts, 4);
        assert_eq!(p0.general_shifts, 4);
        assert_eq!(p0.worked_days, 2);
        assert!(p0.consecutive_days);
        assert_eq!(p0.consecutive_dates, vec![NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()]);
        assert_eq!(fairness.total_spread, 4);
        assert_eq!(fairness.consecutive_physicians, 1);
        assert!((fairness.score - 2.0).abs() < 1e-9);
    }
}
