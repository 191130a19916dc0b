use std::sync::Arc;

use config::SeedConfig;
use domain::{Identity, PermissionClaim, Role, UserEmail, UserId, Username};

use crate::{clock::Clock, error::ApplicationError, repository::CredentialStore};

/// 权限声明的类型
pub const PERMISSION_CLAIM_TYPE: &str = "RoleClaim";

pub const PERMISSION_ROLE_VIEW: &str = "HasRoleView";
pub const PERMISSION_ROLE_ADD: &str = "HasRoleAdd";
pub const PERMISSION_ROLE_EDIT: &str = "HasRoleEdit";
pub const PERMISSION_ROLE_DELETE: &str = "HasRoleDelete";

const PASSWORD_MIN_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub struct AccountServiceDependencies {
    pub credential_store: Arc<dyn CredentialStore>,
    pub clock: Arc<dyn Clock>,
}

/// 账户管理：注册与初始数据
pub struct AccountService {
    deps: AccountServiceDependencies,
}

impl AccountService {
    pub fn new(deps: AccountServiceDependencies) -> Self {
        Self { deps }
    }

    /// 注册新身份并加入 `User` 角色
    pub async fn register(&self, request: RegisterUserRequest) -> Result<Identity, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;
        validate_password(&request.password)?;

        let identity = Identity::new(UserId::generate(), username, email, self.deps.clock.now());
        let stored = self
            .deps
            .credential_store
            .create(identity, &request.password, &[Role::new(Role::USER)])
            .await?;

        tracing::info!(user_id = %stored.id, username = %stored.username, "user registered");
        Ok(stored)
    }

    /// 确保内置角色存在；启用时确保默认管理员存在并属于 `Administrator`。可重复执行。
    pub async fn seed_defaults(&self, seed: &SeedConfig) -> Result<(), ApplicationError> {
        let store = &self.deps.credential_store;
        let administrator = Role::new(Role::ADMINISTRATOR);
        store
            .ensure_role(
                &administrator,
                &permissions(&[
                    PERMISSION_ROLE_VIEW,
                    PERMISSION_ROLE_ADD,
                    PERMISSION_ROLE_EDIT,
                    PERMISSION_ROLE_DELETE,
                ])?,
            )
            .await?;
        store
            .ensure_role(&Role::new(Role::USER), &permissions(&[PERMISSION_ROLE_VIEW])?)
            .await?;

        if !seed.enabled {
            return Ok(());
        }

        let email = UserEmail::parse(seed.admin_email.clone())?;
        match store.find_by_email(&email).await? {
            Some(existing) => store.add_to_role(&existing, &administrator).await?,
            None => {
                let identity = Identity::new(
                    UserId::generate(),
                    Username::parse(seed.admin_username.clone())?,
                    email,
                    self.deps.clock.now(),
                );
                let created = store
                    .create(identity, &seed.admin_password, &[administrator])
                    .await?;
                tracing::info!(user_id = %created.id, "default administrator created");
            }
        }
        Ok(())
    }
}

fn permissions(values: &[&str]) -> Result<Vec<PermissionClaim>, ApplicationError> {
    values
        .iter()
        .map(|value| PermissionClaim::new(PERMISSION_CLAIM_TYPE, *value).map_err(Into::into))
        .collect()
}

/// 至少 6 位，包含数字、小写字母、大写字母和符号
fn validate_password(password: &str) -> Result<(), ApplicationError> {
    let rules: [(bool, &str); 5] = [
        (
            password.chars().count() >= PASSWORD_MIN_LENGTH,
            "must be at least 6 characters",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "must contain a digit",
        ),
        (
            password.chars().any(|c| c.is_lowercase()),
            "must contain a lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_uppercase()),
            "must contain an uppercase letter",
        ),
        (
            password.chars().any(|c| !c.is_alphanumeric()),
            "must contain a non-alphanumeric character",
        ),
    ];
    match rules.iter().find(|(ok, _)| !ok) {
        Some((_, reason)) => Err(ApplicationError::validation("password", *reason)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(validate_password("Abc12!").is_ok());
        for weak in ["Ab1!", "abcdef1!", "ABCDEF1!", "Abcdefg!", "Abcdef12"] {
            assert!(
                matches!(
                    validate_password(weak),
                    Err(ApplicationError::Validation { .. })
                ),
                "{weak} should be rejected"
            );
        }
    }
}
