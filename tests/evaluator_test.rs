// ==========================================
// 约束校验引擎集成测试
// ==========================================
// 测试目标: 手工构造的排班能被准确识别违规、未排格子与失效引用
// ==========================================


use physician_roster::domain::{MonthConfig, MonthRoster, ShiftPeriod, SlotKey, Ward};
use physician_roster::engine::{ConstraintEvaluator, RosterGenerator, ViolationKind};
use test_helpers::{date, physicians};

fn slot(period: ShiftPeriod, ward: Ward) -> SlotKey {
    SlotKey::new(period, ward)
}

/// 2025-03 已生成的合法排班
fn generated_march(n: usize) -> (MonthRoster, Vec<physician_roster::domain::Physician>) {
    let staff = physicians(n);
    let roster = RosterGenerator::default()
        .generate(&staff, &MonthConfig::new(2025, 3))
        .unwrap();
    (roster, staff)
}

#[test]
fn test_blank_month_reports_uncovered_only() {
    let staff = physicians(3);
    let roster = MonthRoster::blank(&MonthConfig::new(2025, 3));
    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);

    assert!(report.is_valid());
    assert!(!report.is_complete());
    // 10 个周末日 × 6 格 + 21 个工作日 × 4 格
    assert_eq!(report.uncovered_slots.len(), 10 * 6 + 21 * 4);
}

#[test]
fn test_ward_conflict_detected() {
    let (mut roster, staff) = generated_march(3);
    let monday = date(2025, 3, 3);
    {
        let day = roster.day_mut(monday).unwrap();
        let general = day
            .slot(slot(ShiftPeriod::Afternoon, Ward::General))
            .unwrap()
            .to_string();
        day.set_slot(slot(ShiftPeriod::Afternoon, Ward::Icu), Some(general.clone()));
        day.set_slot(slot(ShiftPeriod::Night, Ward::Icu), Some(general));
    }

    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);
    let conflicts = report.violations_of(ViolationKind::WardConflict);

    assert_eq!(conflicts.len(), 2);
    assert!(conflicts.iter().all(|v| v.date == Some(monday)));
}

#[test]
fn test_continuity_broken_detected() {
    let (mut roster, staff) = generated_march(3);
    let monday = date(2025, 3, 3);
    roster
        .day_mut(monday)
        .unwrap()
        .set_slot(slot(ShiftPeriod::Night, Ward::General), None);

    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);

    assert_eq!(report.violations_of(ViolationKind::ContinuityBroken).len(), 1);
    assert_eq!(report.uncovered_slots.len(), 1);
}

#[test]
fn test_cross_ward_chain_detected_on_holiday() {
    let (mut roster, staff) = generated_march(3);
    let saturday = date(2025, 3, 1);
    {
        let day = roster.day_mut(saturday).unwrap();
        let icu_morning = day
            .slot(slot(ShiftPeriod::Morning, Ward::Icu))
            .unwrap()
            .to_string();
        // 换成当天未值班的第三人, 链条断开
        let idle = staff
            .iter()
            .find(|p| !day.works(&p.id))
            .unwrap()
            .id
            .clone();
        assert_ne!(idle, icu_morning);
        day.set_slot(slot(ShiftPeriod::Morning, Ward::Icu), Some(idle));
    }

    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);
    let broken = report.violations_of(ViolationKind::CrossWardChainBroken);

    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].slots.len(), 2);
}

#[test]
fn test_morning_on_workday_detected() {
    let (mut roster, staff) = generated_march(3);
    roster
        .day_mut(date(2025, 3, 4))
        .unwrap()
        .set_slot(slot(ShiftPeriod::Morning, Ward::General), Some("P2".into()));

    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);

    assert_eq!(report.violations_of(ViolationKind::MorningOnWorkday).len(), 1);
}

#[test]
fn test_unavailable_and_inactive_reported_once_per_day() {
    let (roster, mut staff) = generated_march(3);
    let monday = date(2025, 3, 3);
    let day = roster.day(monday).unwrap();
    let general = day.slot(slot(ShiftPeriod::Afternoon, Ward::General)).unwrap();
    let icu = day.slot(slot(ShiftPeriod::Afternoon, Ward::Icu)).unwrap();

    for p in staff.iter_mut() {
        if p.id == general {
            p.mark_unavailable(monday);
        }
        if p.id == icu {
            p.active = false;
        }
    }

    let report = ConstraintEvaluator::new().evaluate(&roster, &staff);
    let unavailable = report.violations_of(ViolationKind::PhysicianUnavailable);
    let inactive: Vec<_> = report
        .violations_of(ViolationKind::PhysicianInactive)
        .into_iter()
        .filter(|v| v.date == Some(monday))
        .collect();

    assert_eq!(unavailable.len(), 1);
    assert_eq!(unavailable[0].slots.len(), 2);
    assert_eq!(unavailable[0].physician_id.as_deref(), Some(general));
    assert_eq!(inactive.len(), 1);
}

#[test]
fn test_stale_reference_is_not_a_violation() {
    let (roster, staff) = generated_march(3);
    let remaining: Vec<_> = staff.into_iter().filter(|p| p.id != "P0").collect();

    let report = ConstraintEvaluator::new().evaluate(&roster, &remaining);

    assert!(!report.stale_references.is_empty());
    assert!(report.stale_references.iter().all(|s| s.physician_id == "P0"));
    assert!(report.violations_of(ViolationKind::PhysicianInactive).is_empty());
    assert!(report.violations_of(ViolationKind::PhysicianUnavailable).is_empty());
}

#[test]
fn test_insufficient_staff_reported() {
    let roster = MonthRoster::blank(&MonthConfig::new(2025, 3));
    let report = ConstraintEvaluator::new().evaluate(&roster, &physicians(1));

    let insufficient = report.violations_of(ViolationKind::InsufficientStaff);
    assert_eq!(insufficient.len(), 1);
    assert_eq!(insufficient[0].date, None);
}

#[test]
fn test_fairness_counts_each_slot_as_one_shift() {
    let (roster, staff) = generated_march(2);
    let fairness = ConstraintEvaluator::new().fairness(&roster, &staff);

    // 两人每天都上班: 21 个工作日各 2 班, 10 个节假日各 3 班
    for load in &fairness.loads {
        assert_eq!(load.total_shifts, 21 * 2 + 10 * 3);
        assert_eq!(load.holiday_shifts, 30);
        assert_eq!(load.worked_days, 31);
        assert!(load.consecutive_days);
    }
    assert_eq!(fairness.total_spread, 0);
    assert_eq!(fairness.consecutive_physicians, 2);
}
