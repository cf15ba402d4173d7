// ==========================================
// 医生排班系统 - 整月排班生成引擎
// ==========================================
// 算法: 按日期顺序回溯搜索 + 贪心公平性排序
// 1) 工作日: 选两名可排班医生, 一人普通午+夜, 一人 ICU午+夜
// 2) 节假日: 选有序组合 (A, B)
//    A → 普通早 + ICU午 + ICU夜; B → ICU早 + 普通午 + 普通夜
// 3) 候选按 CandidateRanker 排序, 依次尝试
// 4) 当天无可行组合时回退到前一天改用次优组合; 退回第一天仍无解则失败
// ==========================================
// 红线: 相同输入（医生顺序、可用性、配置）结果必须可复现
// 红线: 同步执行, 要么完整成功, 要么失败, 不返回半成品
// ==========================================

use crate::domain::calendar::MonthConfig;
use crate::domain::physician::Physician;
use crate::domain::roster::MonthRoster;
use crate::engine::ranking::{CandidateRanker, DutyPair, LoadLedger, RankingCriterion};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// 默认回溯次数上限
pub const DEFAULT_MAX_BACKTRACKS: u64 = 200_000;

// ==========================================
// GenerationError - 生成失败
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("在岗医生不足: 当前 {active} 人, 至少需要 2 人")]
    InsufficientStaff { active: usize },

    #[error("无可行排班: 阻塞日期 {date}, {reason}")]
    Unsatisfiable { date: NaiveDate, reason: String },

    #[error("月度配置无效: {0}")]
    InvalidConfig(String),
}

// ==========================================
// GenerationSettings - 生成参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// 候选排序准则（按优先级）
    pub ranking_order: Vec<RankingCriterion>,
    /// 禁止相邻两天连续上班（硬约束）
    pub forbid_consecutive_days: bool,
    /// 回溯次数上限
    pub max_backtracks: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            ranking_order: RankingCriterion::default_order(),
            forbid_consecutive_days: false,
            max_backtracks: DEFAULT_MAX_BACKTRACKS,
        }
    }
}

/// 单日搜索帧
struct DayFrame {
    candidates: Vec<DutyPair>,
    cursor: usize,
    tried: Vec<(usize, usize)>,
    ledger_before: LoadLedger,
}

// ==========================================
// RosterGenerator - 排班生成引擎
// ==========================================
pub struct RosterGenerator {
    settings: GenerationSettings,
    ranker: CandidateRanker,
}

impl RosterGenerator {
    pub fn new(settings: GenerationSettings) -> Self {
        let ranker = CandidateRanker::new(settings.ranking_order.clone());
        Self { settings, ranker }
    }

    pub fn with_default_settings() -> Self {
        Self::new(GenerationSettings::default())
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// 生成整月排班
    ///
    /// # 参数
    /// - `physicians`: 医生名单（停岗医生会被过滤; 名单顺序决定平局）
    /// - `config`: 月度配置
    ///
    /// # 返回
    /// - Ok(MonthRoster): 满足全部硬约束的完整排班
    /// - Err(InsufficientStaff): 在岗不足 2 人, 不进入搜索
    /// - Err(Unsatisfiable): 搜索穷尽, 带阻塞日期
    #[instrument(skip(self, physicians, config), fields(
        year = config.year,
        month = config.month,
        physicians = physicians.len()
    ))]
    pub fn generate(
        &self,
        physicians: &[Physician],
        config: &MonthConfig,
    ) -> Result<MonthRoster, GenerationError> {
        config.validate().map_err(GenerationError::InvalidConfig)?;

        let active: Vec<&Physician> = physicians.iter().filter(|p| p.active).collect();
        if active.len() < 2 {
            warn!(active = active.len(), "在岗医生不足, 放弃生成");
            return Err(GenerationError::InsufficientStaff {
                active: active.len(),
            });
        }

        let mut roster = MonthRoster::blank(config);
        let days: Vec<(NaiveDate, bool)> = roster.days.iter().map(|d| (d.date, d.is_holiday)).collect();

        // 各天可排班医生（与之前选择无关, 先行判定, 避免无意义回溯）
        let eligible: Vec<Vec<usize>> = days
            .iter()
            .map(|(date, _)| {
                active
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.is_available_on(*date))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        for ((date, _), pool) in days.iter().zip(eligible.iter()) {
            if pool.len() < 2 {
                warn!(date = %date, eligible = pool.len(), "当天可排班医生不足");
                return Err(GenerationError::Unsatisfiable {
                    date: *date,
                    reason: format!("可排班医生仅 {} 人, 至少需要 2 人", pool.len()),
                });
            }
        }

        let chosen = self.search(&days, &eligible, active.len())?;

        for (day, pair) in roster.days.iter_mut().zip(chosen.iter()) {
            let first = &active[pair.first].id;
            let second = &active[pair.second].id;
            for key in DutyPair::first_slots(day.is_holiday) {
                day.set_slot(key, Some(first.clone()));
            }
            for key in DutyPair::second_slots(day.is_holiday) {
                day.set_slot(key, Some(second.clone()));
            }
        }

        info!(
            days = roster.days.len(),
            slots = roster.assigned_slot_count(),
            "整月排班生成完成"
        );
        Ok(roster)
    }

    /// 回溯搜索, 返回每天选定的组合
    fn search(
        &self,
        days: &[(NaiveDate, bool)],
        eligible: &[Vec<usize>],
        staff_size: usize,
    ) -> Result<Vec<DutyPair>, GenerationError> {
        let mut frames: Vec<DayFrame> = Vec::with_capacity(days.len());
        let mut chosen: Vec<DutyPair> = Vec::with_capacity(days.len());
        let mut ledger = LoadLedger::new(staff_size);
        let mut backtracks: u64 = 0;
        // 搜索到达过的最深失败日
        let mut blocking: Option<usize> = None;

        while chosen.len() < days.len() {
            let day_idx = chosen.len();
            let (date, is_holiday) = days[day_idx];

            if frames.len() == day_idx {
                let previous = if day_idx > 0 { chosen.last().copied() } else { None };
                let candidates = self.candidates(&eligible[day_idx], previous, &ledger, date, is_holiday);
                frames.push(DayFrame {
                    candidates,
                    cursor: 0,
                    tried: Vec::new(),
                    ledger_before: ledger.clone(),
                });
            }

            let frame = &mut frames[day_idx];
            let mut next = None;
            while frame.cursor < frame.candidates.len() {
                let pair = frame.candidates[frame.cursor];
                frame.cursor += 1;
                // 硬约束只与成员有关, 同一成员的另一方向无需重试
                if !frame.tried.contains(&pair.members()) {
                    next = Some(pair);
                    break;
                }
            }

            match next {
                Some(pair) => {
                    frame.tried.push(pair.members());
                    ledger = frame.ledger_before.clone();
                    ledger.record(pair, date, is_holiday);
                    chosen.push(pair);
                }
                None => {
                    if blocking.map_or(true, |b| day_idx >= b) {
                        blocking = Some(day_idx);
                    }
                    frames.pop();
                    let blocking_date = days[blocking.unwrap_or(day_idx)].0;

                    if chosen.pop().is_none() {
                        warn!(date = %blocking_date, "回溯至首日仍无解");
                        return Err(GenerationError::Unsatisfiable {
                            date: blocking_date,
                            reason: "回溯至首日仍无可行组合".to_string(),
                        });
                    }

                    backtracks += 1;
                    if backtracks > self.settings.max_backtracks {
                        warn!(backtracks, date = %blocking_date, "超过回溯上限");
                        return Err(GenerationError::Unsatisfiable {
                            date: blocking_date,
                            reason: format!("超过回溯上限 {}", self.settings.max_backtracks),
                        });
                    }
                    debug!(date = %date, backtracks, "当天无可行组合, 回退前一天");
                }
            }
        }

        Ok(chosen)
    }

    /// 当天候选组合（已排序）
    fn candidates(
        &self,
        pool: &[usize],
        previous: Option<DutyPair>,
        ledger: &LoadLedger,
        date: NaiveDate,
        is_holiday: bool,
    ) -> Vec<DutyPair> {
        let pool: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|idx| {
                !(self.settings.forbid_consecutive_days
                    && previous.is_some_and(|p| p.contains(*idx)))
            })
            .collect();

        let mut pairs = Vec::with_capacity(pool.len() * pool.len().saturating_sub(1));
        for &a in &pool {
            for &b in &pool {
                if a != b {
                    pairs.push(DutyPair::new(a, b));
                }
            }
        }
        self.ranker.rank(pairs, ledger, date, is_holiday)
    }
}

impl Default for RosterGenerator {
    fn default() -> Self {
        Self::with_default_settings()
    }
}
