// ==========================================
// 医生排班系统 - 引擎层
// ==========================================
// 职责: 约束校验、自动排班、手工编辑级联
// 红线: Engine 不拼 SQL, 不做持久化, 所有违规必须输出 reason
// ==========================================

pub mod cascade;
pub mod evaluator;
pub mod generator;
pub mod ranking;

// 重导出核心引擎
pub use cascade::{EditCascade, EditOutcome, EditWarning, EditWarningKind};
pub use evaluator::{
    ConstraintEvaluator, EvaluationReport, FairnessReport, PhysicianLoad, StaleReference,
    UncoveredSlot, Violation, ViolationKind,
};
pub use generator::{GenerationError, GenerationSettings, RosterGenerator, DEFAULT_MAX_BACKTRACKS};
pub use ranking::{CandidateRanker, DutyPair, LoadLedger, RankingCriterion};
