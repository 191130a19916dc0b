use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserEmail, UserId, Username};

/// 由凭据存储持有的用户身份。核心逻辑只读取，不修改。
///
/// 角色成员关系不缓存在身份上，签发令牌时总是向凭据存储重新查询。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    pub created_at: Timestamp,
}

impl Identity {
    pub fn new(id: UserId, username: Username, email: UserEmail, now: Timestamp) -> Self {
        Self {
            id,
            username,
            email,
            created_at: now,
        }
    }
}
