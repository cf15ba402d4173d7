// ==========================================
// 医生排班系统 - 排班编辑会话 API
// ==========================================
// 职责:
// 1. 打开当前月份（合并已保存的日排班与节假日标记）
// 2. 整月自动生成 / 单格编辑级联 / 节假日配置
// 3. 切换月份、退出前强制保存; 保存失败则中止切换
// 4. 约束校验报告与只读导出视图
// 5. ActionLog记录
// ==========================================
// 红线: 生成与编辑仅对 admin / editor 开放
// 红线: 未保存的修改只有在用户显式放弃时才会被丢弃
// ==========================================

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::export::RosterExport;
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::calendar::{CustomHoliday, MonthConfig};
use crate::domain::physician::Physician;
use crate::domain::roster::MonthRoster;
use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use crate::engine::cascade::{EditCascade, EditOutcome};
use crate::engine::evaluator::{ConstraintEvaluator, EvaluationReport};
use crate::engine::generator::RosterGenerator;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::roster_store::RosterStore;
use crate::sync::{PersistenceSynchronizer, SyncState};
use chrono::{Datelike, Local, NaiveDate};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument, warn};

/// 会话上下文: 当前月份配置 + 医生名单
struct EditorContext {
    config: MonthConfig,
    physicians: Vec<Physician>,
}

// ==========================================
// RosterApi - 排班编辑会话
// ==========================================
pub struct RosterApi {
    user: AuthenticatedUser,
    store: Arc<dyn RosterStore>,
    config_manager: Arc<ConfigManager>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
    sync: PersistenceSynchronizer,
    context: Mutex<EditorContext>,
    evaluator: ConstraintEvaluator,
    cascade: EditCascade,
}

impl RosterApi {
    /// 打开编辑会话
    ///
    /// 未保存过月度配置时使用本地当前月份
    ///
    /// 需在 tokio 运行时内调用
    pub async fn open(
        store: Arc<dyn RosterStore>,
        config_manager: Arc<ConfigManager>,
        user: AuthenticatedUser,
    ) -> ApiResult<Self> {
        let config = match store.load_config().await? {
            Some(config) => config,
            None => MonthConfig::for_date(Local::now().date_naive()),
        };
        let physicians = store.load_physicians().await?;
        let persisted = store.load_month_roster().await?;
        let roster = MonthRoster::synthesize(&config, &persisted);

        info!(
            user = %user.username,
            role = %user.role,
            year = config.year,
            month = config.month,
            physicians = physicians.len(),
            "排班会话已打开"
        );

        let sync =
            PersistenceSynchronizer::new(store.clone(), roster, config_manager.load_sync_settings()?);

        Ok(Self {
            user,
            store,
            config_manager,
            action_log_repo: None,
            sync,
            context: Mutex::new(EditorContext { config, physicians }),
            evaluator: ConstraintEvaluator::new(),
            cascade: EditCascade::new(),
        })
    }

    /// 启用操作日志记录
    pub fn with_action_log(mut self, action_log_repo: Arc<ActionLogRepository>) -> Self {
        self.action_log_repo = Some(action_log_repo);
        self
    }

    fn context(&self) -> ApiResult<MutexGuard<'_, EditorContext>> {
        self.context
            .lock()
            .map_err(|e| ApiError::InternalError(format!("会话锁获取失败: {}", e)))
    }

    /// 写操作日志; 失败只告警, 不影响排班操作
    fn audit(&self, log: ActionLog) {
        if let Some(repo) = &self.action_log_repo {
            if let Err(e) = repo.insert(&log) {
                warn!(action_type = %log.action_type, error = %e, "操作日志写入失败");
            }
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn user(&self) -> &AuthenticatedUser {
        &self.user
    }

    pub fn config(&self) -> ApiResult<MonthConfig> {
        Ok(self.context()?.config.clone())
    }

    pub fn physicians(&self) -> ApiResult<Vec<Physician>> {
        Ok(self.context()?.physicians.clone())
    }

    /// 内存排班快照
    pub fn roster(&self) -> ApiResult<MonthRoster> {
        Ok(self.sync.snapshot()?)
    }

    pub fn sync_state(&self) -> ApiResult<SyncState> {
        Ok(self.sync.state()?)
    }

    pub fn is_dirty(&self) -> ApiResult<bool> {
        Ok(self.sync.is_dirty()?)
    }

    pub fn synchronizer(&self) -> &PersistenceSynchronizer {
        &self.sync
    }

    /// 校验当前排班
    pub fn evaluate(&self) -> ApiResult<EvaluationReport> {
        let physicians = self.physicians()?;
        let report = self
            .sync
            .read(|roster| self.evaluator.evaluate(roster, &physicians))?;
        Ok(report)
    }

    /// 只读导出视图（已移除医生显示为未知医生）
    pub fn export_view(&self) -> ApiResult<RosterExport> {
        let physicians = self.physicians()?;
        Ok(self
            .sync
            .read(|roster| RosterExport::build(roster, &physicians))?)
    }

    // ==========================================
    // 排班修改
    // ==========================================

    /// 单格编辑（按约束模型级联, 永不因约束失败）
    ///
    /// # 参数
    /// - `physician_id`: None 或空串表示清空
    ///
    /// # 返回
    /// - Ok(EditOutcome): 写入的格子与提示性警告
    /// - Err(PermissionDenied): 当前用户无编辑权限
    pub fn edit_cell(
        &self,
        date: NaiveDate,
        period: ShiftPeriod,
        ward: Ward,
        physician_id: Option<&str>,
    ) -> ApiResult<EditOutcome> {
        self.user.require_roster_editor()?;

        let physician_id = physician_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let physicians = self.physicians()?;

        // 不属于当前月份: 只返回提示, 不计入未保存修改
        if !self.sync.read(|roster| roster.contains(date))? {
            let mut scratch = self.sync.snapshot()?;
            return Ok(self.cascade.apply_edit(
                &mut scratch,
                date,
                period,
                ward,
                physician_id,
                &physicians,
            ));
        }

        let outcome = self.sync.mutate(|roster| {
            self.cascade
                .apply_edit(roster, date, period, ward, physician_id.clone(), &physicians)
        })?;

        if outcome.has_warnings() {
            info!(
                date = %date,
                slot = %SlotKey::new(period, ward),
                warnings = outcome.warnings.len(),
                "单格编辑存在提示"
            );
        }

        let (year, month) = {
            let ctx = self.context()?;
            (ctx.config.year, ctx.config.month)
        };
        self.audit(
            ActionLog::new(ActionType::EditCell, &self.user.username)
                .with_month(year, month)
                .with_date(date)
                .with_payload(json!({
                    "slot": SlotKey::new(period, ward).to_string(),
                    "physicianId": physician_id,
                    "written": outcome.written.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    "warnings": outcome.warnings.len(),
                })),
        );

        Ok(outcome)
    }

    /// 整月自动生成（CPU 密集, 在阻塞线程池中运行）
    ///
    /// # 返回
    /// - Ok(EvaluationReport): 新排班的校验报告
    /// - Err(Generation): 在岗不足 / 无可行解; 内存排班保持不变
    /// - Err(Conflict): 生成期间切换了月份或修改了节假日; 内存排班保持不变
    #[instrument(skip(self), fields(user = %self.user.username))]
    pub async fn regenerate(&self) -> ApiResult<EvaluationReport> {
        self.user.require_roster_editor()?;

        let settings = self.config_manager.load_generation_settings()?;
        let (config, physicians) = {
            let ctx = self.context()?;
            (ctx.config.clone(), ctx.physicians.clone())
        };

        let (gen_config, gen_physicians) = (config.clone(), physicians.clone());
        let roster = tokio::task::spawn_blocking(move || {
            RosterGenerator::new(settings).generate(&gen_physicians, &gen_config)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("排班生成任务异常: {}", e)))??;

        let report = self.evaluator.evaluate(&roster, &physicians);
        {
            let ctx = self.context()?;
            if ctx.config != config {
                warn!(
                    year = config.year,
                    month = config.month,
                    current_year = ctx.config.year,
                    current_month = ctx.config.month,
                    "生成期间月份配置已变化, 丢弃生成结果"
                );
                return Err(ApiError::Conflict(format!(
                    "生成期间 {}-{:02} 的月份配置已变化, 生成结果已丢弃",
                    config.year, config.month
                )));
            }
            self.sync.replace(roster)?;
        }

        info!(
            year = config.year,
            month = config.month,
            violations = report.violations.len(),
            fairness_score = report.fairness.score,
            "整月排班已替换"
        );

        self.audit(
            ActionLog::new(ActionType::GenerateRoster, &self.user.username)
                .with_month(config.year, config.month)
                .with_payload(json!({
                    "violations": report.violations.len(),
                    "totalSpread": report.fairness.total_spread,
                    "holidaySpread": report.fairness.holiday_spread,
                })),
        );

        Ok(report)
    }

    /// 替换本月自定义节假日, 并原地重算节假日标记
    ///
    /// 其他月份的自定义节假日保持不变
    ///
    /// # 返回
    /// - Err(InvalidInput): 传入的日期不属于当前月份
    pub async fn update_custom_holidays(&self, holidays: Vec<CustomHoliday>) -> ApiResult<()> {
        self.user.require_roster_editor()?;

        let mut config = self.config()?;
        if let Some(outside) = holidays.iter().find(|h| !config.contains(h.date)) {
            return Err(ApiError::InvalidInput(format!(
                "{} 不属于当前月份 {}-{:02}",
                outside.date, config.year, config.month
            )));
        }

        let (year, month) = (config.year, config.month);
        config
            .custom_holidays
            .retain(|h| h.date.year() != year || h.date.month() != month);
        for holiday in holidays {
            config.upsert_holiday(holiday);
        }
        config.validate().map_err(ApiError::InvalidInput)?;

        self.store.save_config(&config).await?;
        let this_month: Vec<&CustomHoliday> = config
            .custom_holidays
            .iter()
            .filter(|h| config.contains(h.date))
            .collect();
        self.audit(
            ActionLog::new(ActionType::UpdateHolidays, &self.user.username)
                .with_month(year, month)
                .with_payload(json!({ "holidays": this_month })),
        );

        let mut ctx = self.context()?;
        self.sync.mutate(|roster| roster.apply_config(&config))?;
        ctx.config = config;
        Ok(())
    }

    /// 重新读取医生名单（名单维护之后）
    pub async fn reload_physicians(&self) -> ApiResult<usize> {
        let physicians = self.store.load_physicians().await?;
        let count = physicians.len();
        self.context()?.physicians = physicians;
        Ok(count)
    }

    // ==========================================
    // 导航
    // ==========================================

    /// 立即保存（不等防抖）
    pub async fn flush_now(&self) -> ApiResult<bool> {
        Ok(self.sync.flush().await?)
    }

    /// 切换月份
    ///
    /// 先强制保存; 保存失败时中止切换, 当前月份与未保存修改保持不变
    ///
    /// # 返回
    /// - Err(PersistenceFailure): 强制保存失败
    /// - Err(Conflict): 强制保存之后又有新的编辑, 可重试
    pub async fn switch_month(&self, year: i32, month: u32) -> ApiResult<()> {
        let target = self.config()?.with_month(year, month);
        target.validate().map_err(ApiError::InvalidInput)?;

        if let Err(e) = self.sync.force_flush().await {
            warn!(year, month, error = %e, "强制保存失败, 中止切换月份");
            return Err(e.into());
        }

        self.load_month(target).await?;
        self.audit(
            ActionLog::new(ActionType::SwitchMonth, &self.user.username).with_month(year, month),
        );
        Ok(())
    }

    /// 放弃未保存修改并切换月份（用户显式确认）
    pub async fn switch_month_discarding(&self, year: i32, month: u32) -> ApiResult<u64> {
        let target = self.config()?.with_month(year, month);
        target.validate().map_err(ApiError::InvalidInput)?;

        let current = self.config()?;
        let dropped = self.sync.discard_pending()?;
        self.audit(
            ActionLog::new(ActionType::DiscardPending, &self.user.username)
                .with_month(current.year, current.month)
                .with_payload(json!({ "droppedRevisions": dropped })),
        );

        self.load_month(target).await?;
        self.audit(
            ActionLog::new(ActionType::SwitchMonth, &self.user.username).with_month(year, month),
        );
        Ok(dropped)
    }

    /// 退出会话前强制保存
    pub async fn logout(&self) -> ApiResult<()> {
        if let Err(e) = self.sync.force_flush().await {
            warn!(user = %self.user.username, error = %e, "强制保存失败, 中止退出");
            return Err(e.into());
        }
        info!(user = %self.user.username, "排班会话已退出");
        Ok(())
    }

    /// 载入月份; 载入前又出现未保存修改时还原已保存的月份配置并返回 Conflict
    async fn load_month(&self, config: MonthConfig) -> ApiResult<()> {
        let previous = self.config()?;
        self.store.save_config(&config).await?;
        let physicians = self.store.load_physicians().await?;
        let persisted = self.store.load_month_roster().await?;
        let roster = MonthRoster::synthesize(&config, &persisted);
        let (year, month) = (config.year, config.month);

        let loaded = {
            let mut ctx = self.context()?;
            self.sync.reset(roster).map(|()| {
                ctx.config = config;
                ctx.physicians = physicians;
            })
        };
        if let Err(e) = loaded {
            warn!(year, month, error = %e, "切换前出现新的修改, 保留当前月份");
            self.store.save_config(&previous).await?;
            return Err(e.into());
        }

        info!(year, month, "已载入月度排班");
        Ok(())
    }
}
