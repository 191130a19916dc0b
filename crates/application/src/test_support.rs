use async_trait::async_trait;
use chrono::Utc;
use config::JwtConfig;
use domain::{Identity, PasswordHash, UserEmail, UserId, Username};

use crate::password::{PasswordHasher, PasswordHasherError};

/// 不做真正哈希的测试用实现
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        PasswordHash::new(format!("plain:{plaintext}"))
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        Ok(hashed.as_str() == format!("plain:{plaintext}"))
    }
}

pub fn identity(username: &str, email: &str) -> Identity {
    Identity::new(
        UserId::generate(),
        Username::parse(username).unwrap(),
        UserEmail::parse(email).unwrap(),
        Utc::now(),
    )
}

pub fn jwt_config(ttl_seconds: i64) -> JwtConfig {
    JwtConfig {
        secret: "unit-test-secret-with-at-least-32-characters".into(),
        issuer: "chatroom".into(),
        audience: "chatroom-clients".into(),
        access_token_ttl_seconds: ttl_seconds,
    }
}

/// 记录所有发布事件的广播器
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: std::sync::Mutex<Vec<crate::broadcaster::ChannelEvent>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<crate::broadcaster::ChannelEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl crate::broadcaster::EventBroadcaster for RecordingBroadcaster {
    fn publish(&self, event: crate::broadcaster::ChannelEvent) -> usize {
        self.events.lock().unwrap().push(event);
        1
    }
}

/// 固定在某一时刻的时钟
pub struct FixedClock(pub domain::Timestamp);

impl crate::clock::Clock for FixedClock {
    fn now(&self) -> domain::Timestamp {
        self.0
    }
}
