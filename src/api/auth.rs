// ==========================================
// 医生排班系统 - 身份认证协作接口
// ==========================================
// 职责: 定义认证接口; 角色门禁由 API 层执行, 引擎不感知
// 红线: 仅 admin / editor 可以生成或编辑排班
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::UserRole;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 登录凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn new(username: &str, role: UserRole) -> Self {
        Self {
            username: username.to_string(),
            role,
        }
    }

    /// 要求具备排班编辑权限
    pub fn require_roster_editor(&self) -> ApiResult<()> {
        if self.role.can_edit_roster() {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(format!(
                "用户 {} ({}) 无排班编辑权限",
                self.username,
                self.role.to_db_str()
            )))
        }
    }

    /// 要求具备医生名单管理权限
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role.can_manage_physicians() {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(format!(
                "用户 {} ({}) 无医生名单管理权限",
                self.username,
                self.role.to_db_str()
            )))
        }
    }
}

// ==========================================
// Authenticator Trait
// ==========================================
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// 校验凭据, 返回用户角色
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthenticatedUser>;
}

// ==========================================
// StaticAuthenticator - 固定账号表（本地部署 / 测试）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    accounts: HashMap<String, (String, UserRole)>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, username: &str, password: &str, role: UserRole) -> Self {
        self.accounts
            .insert(username.to_string(), (password.to_string(), role));
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthenticatedUser> {
        match self.accounts.get(credentials.username.trim()) {
            Some((password, role)) if *password == credentials.password => {
                Ok(AuthenticatedUser::new(credentials.username.trim(), *role))
            }
            _ => Err(ApiError::PermissionDenied("用户名或密码错误".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_authenticator_roles() {
        let auth = StaticAuthenticator::new()
            .with_account("admin", "pw", UserRole::Admin)
            .with_account("viewer", "pw", UserRole::Viewer);

        let admin = auth.authenticate(&Credentials::new("admin", "pw")).await.unwrap();
        assert!(admin.require_roster_editor().is_ok());
        assert!(admin.require_admin().is_ok());

        let viewer = auth.authenticate(&Credentials::new("viewer", "pw")).await.unwrap();
        assert!(matches!(
            viewer.require_roster_editor(),
            Err(ApiError::PermissionDenied(_))
        ));

        assert!(auth.authenticate(&Credentials::new("admin", "bad")).await.is_err());
    }
}
