// ==========================================
// 医生排班系统 - 医生名单管理 API
// ==========================================
// 职责: 新增医生、停岗/复岗、不可排班日期维护
// 红线: 仅管理员可修改; 医生从不物理删除
// ==========================================

use crate::api::auth::AuthenticatedUser;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::physician::Physician;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::roster_store::RosterStore;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub struct PhysicianApi {
    user: AuthenticatedUser,
    store: Arc<dyn RosterStore>,
    action_log_repo: Option<Arc<ActionLogRepository>>,
}

impl PhysicianApi {
    pub fn new(store: Arc<dyn RosterStore>, user: AuthenticatedUser) -> Self {
        Self {
            user,
            store,
            action_log_repo: None,
        }
    }

    /// 启用操作日志记录
    pub fn with_action_log(mut self, action_log_repo: Arc<ActionLogRepository>) -> Self {
        self.action_log_repo = Some(action_log_repo);
        self
    }

    fn audit(&self, physician_id: &str, operation: &str, detail: String) {
        let Some(repo) = &self.action_log_repo else {
            return;
        };
        let log = ActionLog::new(ActionType::ManagePhysician, &self.user.username)
            .with_payload(json!({ "physicianId": physician_id, "operation": operation }))
            .with_detail(detail);
        if let Err(e) = repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }
    }

    /// 医生名单（含停岗医生, 名单顺序）
    pub async fn list(&self) -> ApiResult<Vec<Physician>> {
        Ok(self.store.load_physicians().await?)
    }

    /// 新增医生（追加到名单末尾）
    pub async fn add_physician(&self, name: &str, phone: &str, color: &str) -> ApiResult<Physician> {
        self.user.require_admin()?;
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("医生姓名不能为空".to_string()));
        }

        let mut physicians = self.store.load_physicians().await?;
        let physician = Physician::new(name, phone, color);
        physicians.push(physician.clone());
        self.store.save_physicians(&physicians).await?;

        info!(physician_id = %physician.id, name = %physician.name, "新增医生");
        self.audit(&physician.id, "ADD", format!("新增医生 {}", physician.name));
        Ok(physician)
    }

    /// 停岗 / 复岗
    pub async fn set_active(&self, physician_id: &str, active: bool) -> ApiResult<Physician> {
        let updated = self
            .modify(physician_id, |p| {
                p.active = active;
                true
            })
            .await?
            .0;
        self.audit(
            physician_id,
            if active { "ACTIVATE" } else { "DEACTIVATE" },
            format!("{} {}", if active { "复岗" } else { "停岗" }, updated.name),
        );
        Ok(updated)
    }

    /// 增加不可排班日期
    ///
    /// # 返回
    /// - Ok(false): 日期已存在
    pub async fn add_unavailable_date(&self, physician_id: &str, date: NaiveDate) -> ApiResult<bool> {
        let (updated, changed) = self
            .modify(physician_id, |p| p.mark_unavailable(date))
            .await?;
        if changed {
            self.audit(physician_id, "ADD_UNAVAILABLE", format!("{} 不可排班 {}", updated.name, date));
        }
        Ok(changed)
    }

    /// 移除不可排班日期
    pub async fn remove_unavailable_date(
        &self,
        physician_id: &str,
        date: NaiveDate,
    ) -> ApiResult<bool> {
        let (updated, changed) = self
            .modify(physician_id, |p| p.clear_unavailable(date))
            .await?;
        if changed {
            self.audit(
                physician_id,
                "REMOVE_UNAVAILABLE",
                format!("{} 恢复可排班 {}", updated.name, date),
            );
        }
        Ok(changed)
    }

    /// 读取-修改-保存单个医生; 未变化时不写库
    async fn modify(
        &self,
        physician_id: &str,
        f: impl FnOnce(&mut Physician) -> bool,
    ) -> ApiResult<(Physician, bool)> {
        self.user.require_admin()?;

        let mut physicians = self.store.load_physicians().await?;
        let target = physicians
            .iter_mut()
            .find(|p| p.id == physician_id)
            .ok_or_else(|| ApiError::NotFound(format!("医生(id={})不存在", physician_id)))?;

        let changed = f(target);
        let updated = target.clone();
        if changed {
            self.store.save_physicians(&physicians).await?;
        }
        Ok((updated, changed))
    }
}
