// ==========================================
// 医生排班系统 - 候选排序（公平性启发）
// ==========================================
// 软目标, 按配置的优先级逐项比较（默认顺序）:
// 1) 前一天未上班优先
// 2) 本月总班次少者优先
// 3) 节假日: 节假日班次少者优先
// 4) 病区均衡: 分配后 ICU/普通 差值小者优先
// 平局按医生名单顺序, 不依赖任何无序迭代
// ==========================================

use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// RankingCriterion - 排序准则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    Rested,
    FewestShifts,
    FewestHolidayShifts,
    WardBalance,
}

impl RankingCriterion {
    pub fn default_order() -> Vec<RankingCriterion> {
        vec![
            RankingCriterion::Rested,
            RankingCriterion::FewestShifts,
            RankingCriterion::FewestHolidayShifts,
            RankingCriterion::WardBalance,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingCriterion::Rested => "rested",
            RankingCriterion::FewestShifts => "fewest_shifts",
            RankingCriterion::FewestHolidayShifts => "fewest_holiday_shifts",
            RankingCriterion::WardBalance => "ward_balance",
        }
    }
}

impl fmt::Display for RankingCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RankingCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rested" => Ok(RankingCriterion::Rested),
            "fewest_shifts" | "fewest-shifts" => Ok(RankingCriterion::FewestShifts),
            "fewest_holiday_shifts" | "fewest-holiday-shifts" => {
                Ok(RankingCriterion::FewestHolidayShifts)
            }
            "ward_balance" | "ward-balance" => Ok(RankingCriterion::WardBalance),
            other => Err(format!("未知排序准则: {}", other)),
        }
    }
}

// ==========================================
// DutyPair - 单日值班组合
// ==========================================
// first/second 为在岗候选医生下标
// 工作日: first → 普通午+夜, second → ICU午+夜
// 节假日: first → 普通早 + ICU午+夜 (模式A)
//         second → ICU早 + 普通午+夜 (模式B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DutyPair {
    pub first: usize,
    pub second: usize,
}

impl DutyPair {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    /// 无序成员（硬约束只关心成员, 不关心方向）
    pub fn members(&self) -> (usize, usize) {
        (self.first.min(self.second), self.first.max(self.second))
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.first == idx || self.second == idx
    }

    /// first 承担的格子
    pub fn first_slots(is_holiday: bool) -> Vec<SlotKey> {
        duty_slots(Ward::General, is_holiday)
    }

    /// second 承担的格子
    pub fn second_slots(is_holiday: bool) -> Vec<SlotKey> {
        duty_slots(Ward::Icu, is_holiday)
    }

    /// 平局键: 名单位置靠前的组合优先, 同组合 first 下标小者优先
    fn tie_key(&self) -> (usize, usize, usize) {
        let (lo, hi) = self.members();
        (lo, hi, self.first)
    }
}

/// 主病区 home 的值班格子
///
/// 工作日在 home 病区上午/夜班; 节假日在 home 病区上早班, 在另一病区上午/夜班
fn duty_slots(home: Ward, is_holiday: bool) -> Vec<SlotKey> {
    if is_holiday {
        vec![
            SlotKey::new(ShiftPeriod::Morning, home),
            SlotKey::new(ShiftPeriod::Afternoon, home.other()),
            SlotKey::new(ShiftPeriod::Night, home.other()),
        ]
    } else {
        vec![
            SlotKey::new(ShiftPeriod::Afternoon, home),
            SlotKey::new(ShiftPeriod::Night, home),
        ]
    }
}

// ==========================================
// LoadLedger - 生成过程中的负荷账本
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub total: u32,
    pub holiday: u32,
    pub icu: u32,
    pub general: u32,
    pub last_worked: Option<NaiveDate>,
}

impl LedgerEntry {
    fn worked_day_before(&self, date: NaiveDate) -> bool {
        match (self.last_worked, date.pred_opt()) {
            (Some(last), Some(prev)) => last == prev,
            _ => false,
        }
    }

    fn record(&mut self, slots: &[SlotKey], date: NaiveDate, is_holiday: bool) {
        let n = slots.len() as u32;
        self.total += n;
        if is_holiday {
            self.holiday += n;
        }
        for slot in slots {
            match slot.ward {
                Ward::Icu => self.icu += 1,
                Ward::General => self.general += 1,
            }
        }
        self.last_worked = Some(date);
    }

    fn imbalance_after(&self, slots: &[SlotKey]) -> u32 {
        let icu = self.icu + slots.iter().filter(|s| s.ward == Ward::Icu).count() as u32;
        let general = self.general + slots.iter().filter(|s| s.ward == Ward::General).count() as u32;
        icu.abs_diff(general)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadLedger {
    entries: Vec<LedgerEntry>,
}

impl LoadLedger {
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![LedgerEntry::default(); size],
        }
    }

    pub fn entry(&self, idx: usize) -> &LedgerEntry {
        &self.entries[idx]
    }

    /// 记账: 当天选定组合
    pub fn record(&mut self, pair: DutyPair, date: NaiveDate, is_holiday: bool) {
        self.entries[pair.first].record(&DutyPair::first_slots(is_holiday), date, is_holiday);
        self.entries[pair.second].record(&DutyPair::second_slots(is_holiday), date, is_holiday);
    }
}

// ==========================================
// CandidateRanker - 候选组合排序器
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRanker {
    criteria: Vec<RankingCriterion>,
}

impl CandidateRanker {
    /// 创建排序器; 重复的准则只保留第一次出现
    pub fn new(criteria: Vec<RankingCriterion>) -> Self {
        let mut unique = Vec::with_capacity(criteria.len());
        for c in criteria {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        Self { criteria: unique }
    }

    pub fn criteria(&self) -> &[RankingCriterion] {
        &self.criteria
    }

    /// 对候选组合排序（最优在前）
    pub fn rank(
        &self,
        mut candidates: Vec<DutyPair>,
        ledger: &LoadLedger,
        date: NaiveDate,
        is_holiday: bool,
    ) -> Vec<DutyPair> {
        candidates.sort_by_cached_key(|pair| {
            let scores: Vec<u32> = self
                .criteria
                .iter()
                .map(|c| self.score(*c, *pair, ledger, date, is_holiday))
                .collect();
            (scores, pair.tie_key())
        });
        candidates
    }

    /// 单项得分, 越小越好
    fn score(
        &self,
        criterion: RankingCriterion,
        pair: DutyPair,
        ledger: &LoadLedger,
        date: NaiveDate,
        is_holiday: bool,
    ) -> u32 {
        let a = ledger.entry(pair.first);
        let b = ledger.entry(pair.second);
        match criterion {
            RankingCriterion::Rested => {
                a.worked_day_before(date) as u32 + b.worked_day_before(date) as u32
            }
            RankingCriterion::FewestShifts => a.total + b.total,
            RankingCriterion::FewestHolidayShifts => {
                if is_holiday {
                    a.holiday + b.holiday
                } else {
                    0
                }
            }
            RankingCriterion::WardBalance => {
                a.imbalance_after(&DutyPair::first_slots(is_holiday))
                    + b.imbalance_after(&DutyPair::second_slots(is_holiday))
            }
        }
    }
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(RankingCriterion::default_order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn all_pairs(n: usize) -> Vec<DutyPair> {
        let mut out = Vec::new();
        for a in 0..n {
            for b in 0..n {
                if a != b {
                    out.push(DutyPair::new(a, b));
                }
            }
        }
        out
    }

    #[test]
    fn test_fresh_ledger_ties_broken_by_list_order() {
        let ranker = CandidateRanker::default();
        let ranked = ranker.rank(all_pairs(3), &LoadLedger::new(3), ymd(3), false);
        assert_eq!(ranked[0], DutyPair::new(0, 1));
        assert_eq!(ranked[1], DutyPair::new(1, 0));
    }

    #[test]
    fn test_rested_physicians_preferred() {
        let mut ledger = LoadLedger::new(4);
        ledger.record(DutyPair::new(0, 1), ymd(3), false);

        let ranked = CandidateRanker::default().rank(all_pairs(4), &ledger, ymd(4), false);
        assert_eq!(ranked[0].members(), (2, 3));
    }

    #[test]
    fn test_ward_balance_orients_pair() {
        let mut ledger = LoadLedger::new(2);
        // 0 上过普通病区, 1 上过 ICU
        ledger.record(DutyPair::new(0, 1), ymd(3), false);

        let ranker = CandidateRanker::new(vec![RankingCriterion::WardBalance]);
        let ranked = ranker.rank(all_pairs(2), &ledger, ymd(5), false);
        // 交换方向后两人均衡
        assert_eq!(ranked[0], DutyPair::new(1, 0));
    }

    #[test]
    fn test_holiday_slots_follow_cross_ward_chain() {
        let first = DutyPair::first_slots(true);
        assert_eq!(first[0], SlotKey::new(ShiftPeriod::Morning, Ward::General));
        assert_eq!(first[1], SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu));
        assert_eq!(first[2], SlotKey::new(ShiftPeriod::Night, Ward::Icu));
        assert_eq!(DutyPair::second_slots(false).len(), 2);
    }

    #[test]
    fn test_criterion_parse_and_dedup() {
        assert_eq!("ward-balance".parse::<RankingCriterion>(), Ok(RankingCriterion::WardBalance));
        assert!("random".parse::<RankingCriterion>().is_err());
        let ranker = CandidateRanker::new(vec![
            RankingCriterion::FewestShifts,
            RankingCriterion::FewestShifts,
        ]);
        assert_eq!(ranker.criteria(), &[RankingCriterion::FewestShifts]);
    }
}
