//! 角色与权限声明
//!
//! 声明推导是纯函数：输入身份的角色成员关系和角色声明表，输出去重后的声明集合。
//! 不依赖任何查询引擎。

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 角色名称作为声明嵌入令牌时使用的声明类型
pub const ROLE_CLAIM_TYPE: &str = "role";

/// 附加在角色上的 (类型, 值) 声明，两者都不能为空。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionClaim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl PermissionClaim {
    pub fn new(
        claim_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let claim_type = claim_type.into();
        let value = value.into();
        if claim_type.trim().is_empty() {
            return Err(DomainError::invalid_argument("claim_type", "cannot be empty"));
        }
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("claim_value", "cannot be empty"));
        }
        Ok(Self { claim_type, value })
    }

    pub fn role(name: impl Into<String>) -> Result<Self, DomainError> {
        Self::new(ROLE_CLAIM_TYPE, name)
    }

    fn is_well_formed(&self) -> bool {
        !self.claim_type.trim().is_empty() && !self.value.trim().is_empty()
    }
}

/// 角色
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role {
    pub name: String,
}

impl Role {
    pub const ADMINISTRATOR: &'static str = "Administrator";
    pub const USER: &'static str = "User";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// 去重后的声明集合，按 (类型, 值) 排序。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeSet<PermissionClaim>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入声明；格式不合法的声明被忽略。返回是否为新增。
    pub fn insert(&mut self, claim: PermissionClaim) -> bool {
        if !claim.is_well_formed() {
            return false;
        }
        self.0.insert(claim)
    }

    pub fn contains(&self, claim_type: &str, value: &str) -> bool {
        self.0
            .iter()
            .any(|claim| claim.claim_type == claim_type && claim.value == value)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.contains(ROLE_CLAIM_TYPE, role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|claim| claim.claim_type == ROLE_CLAIM_TYPE)
            .map(|claim| claim.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionClaim> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PermissionClaim> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = PermissionClaim>>(iter: I) -> Self {
        let mut set = ClaimSet::new();
        for claim in iter {
            set.insert(claim);
        }
        set
    }
}

impl IntoIterator for ClaimSet {
    type Item = PermissionClaim;
    type IntoIter = std::collections::btree_set::IntoIter<PermissionClaim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// 根据角色成员关系和角色声明表推导令牌中的声明集合。
///
/// 结果包含所有角色声明的并集（按值去重）以及每个角色名对应的 `role` 声明。
/// 空名称的角色和空类型/空值的声明会被丢弃。
pub fn derive_claims(
    memberships: &[Role],
    role_claims: &HashMap<Role, Vec<PermissionClaim>>,
) -> ClaimSet {
    let mut set = ClaimSet::new();
    for role in memberships {
        if let Some(claims) = role_claims.get(role) {
            for claim in claims {
                set.insert(claim.clone());
            }
        }
    }
    for role in memberships {
        if let Ok(claim) = PermissionClaim::role(role.name.clone()) {
            set.insert(claim);
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(t: &str, v: &str) -> PermissionClaim {
        PermissionClaim::new(t, v).unwrap()
    }

    #[test]
    fn shared_claims_across_roles_collapse() {
        let admin = Role::new("Administrator");
        let user = Role::new("User");
        let mut table = HashMap::new();
        table.insert(
            admin.clone(),
            vec![claim("RoleClaim", "HasRoleView"), claim("RoleClaim", "HasRoleAdd")],
        );
        table.insert(user.clone(), vec![claim("RoleClaim", "HasRoleView")]);

        let set = derive_claims(&[admin, user], &table);

        assert_eq!(set.len(), 4);
        assert!(set.contains("RoleClaim", "HasRoleView"));
        assert!(set.contains("RoleClaim", "HasRoleAdd"));
        let roles: Vec<&str> = set.roles().collect();
        assert_eq!(roles, vec!["Administrator", "User"]);
    }

    #[test]
    fn roles_without_claims_still_contribute_role_claim() {
        let set = derive_claims(&[Role::new("Auditor")], &HashMap::new());
        assert!(set.has_role("Auditor"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let mut table = HashMap::new();
        table.insert(
            Role::new("User"),
            vec![PermissionClaim {
                claim_type: "RoleClaim".into(),
                value: "".into(),
            }],
        );
        let set = derive_claims(&[Role::new("User"), Role::new(" ")], &table);
        assert_eq!(set.roles().collect::<Vec<_>>(), vec!["User"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn claim_serializes_with_type_key() {
        let json = serde_json::to_value(claim("RoleClaim", "HasRoleView")).unwrap();
        assert_eq!(json["type"], "RoleClaim");
        assert_eq!(json["value"], "HasRoleView");
    }
}
