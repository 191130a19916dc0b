//! JWT 访问令牌的签发与校验
//!
//! 访问令牌是无状态的：校验只依赖签名密钥和内嵌的时间戳，不查询任何存储。

use chrono::Duration;
use config::JwtConfig;
use domain::{ClaimSet, Identity, Timestamp, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// 访问令牌中的声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub username: String,
    /// 权限声明与角色声明的并集
    #[serde(default)]
    pub claims: ClaimSet,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// 已通过令牌认证的调用方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: UserId,
    pub username: String,
    pub claims: ClaimSet,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.claims.has_role(role)
    }
}

impl From<AccessClaims> for Principal {
    fn from(value: AccessClaims) -> Self {
        Self {
            subject: value.sub,
            username: value.username,
            claims: value.claims,
        }
    }
}

/// HS256 编解码器
#[derive(Clone)]
pub struct JwtCodec {
    issuer: String,
    audience: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: Duration::seconds(config.access_token_ttl_seconds),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.ttl
    }

    /// 签发访问令牌，过期时间为 `issued_at + ttl`
    pub fn encode(
        &self,
        identity: &Identity,
        claims: ClaimSet,
        issued_at: Timestamp,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at + self.ttl;
        let payload = AccessClaims {
            sub: identity.id,
            username: identity.username.as_str().to_owned(),
            claims,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    /// 完整校验：签名、签发者、受众与过期时间，不允许时钟偏差。
    /// `now` 与签发时使用同一个时钟。
    pub fn decode(&self, token: &str, now: Timestamp) -> Result<AccessClaims, TokenError> {
        let claims = self.decode_signed(token)?;
        if claims.exp < now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// 刷新流程使用：令牌可以已过期，但过期时间不能早于 `grace` 之前
    pub fn decode_allowing_expired(
        &self,
        token: &str,
        grace: Duration,
        now: Timestamp,
    ) -> Result<AccessClaims, TokenError> {
        let claims = self.decode_signed(token)?;
        if claims.exp + grace.num_seconds() < now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    // 过期时间由调用方按注入的时钟判断
    fn decode_signed(&self, token: &str) -> Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|err| TokenError::Invalid(err.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{PermissionClaim, UserEmail, Username};

    fn config(ttl: i64) -> JwtConfig {
        JwtConfig {
            secret: "unit-test-secret-with-at-least-32-characters".into(),
            issuer: "chatroom".into(),
            audience: "chatroom-clients".into(),
            access_token_ttl_seconds: ttl,
        }
    }

    fn identity() -> Identity {
        Identity::new(
            UserId::generate(),
            Username::parse("alice").unwrap(),
            UserEmail::parse("alice@example.com").unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn round_trip_preserves_claims() {
        let codec = JwtCodec::new(&config(60));
        let alice = identity();
        let claims: ClaimSet = vec![
            PermissionClaim::new("RoleClaim", "HasRoleView").unwrap(),
            PermissionClaim::role("User").unwrap(),
        ]
        .into_iter()
        .collect();

        let token = codec.encode(&alice, claims.clone(), Utc::now()).unwrap();
        let decoded = codec.decode(&token, Utc::now()).unwrap();

        assert_eq!(decoded.sub, alice.id);
        assert_eq!(decoded.username, "alice");
        assert_eq!(decoded.claims, claims);
        assert_eq!(decoded.exp - decoded.iat, 60);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let codec = JwtCodec::new(&config(60));
        let mut other = config(60);
        other.issuer = "someone-else".into();
        let foreign = JwtCodec::new(&other);

        let token = foreign
            .encode(&identity(), ClaimSet::new(), Utc::now())
            .unwrap();
        assert!(matches!(codec.decode(&token, Utc::now()), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = JwtCodec::new(&config(60));
        let mut token = codec
            .encode(&identity(), ClaimSet::new(), Utc::now())
            .unwrap();
        token.push('x');
        assert!(matches!(codec.decode(&token, Utc::now()), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_accepted_only_within_grace() {
        let codec = JwtCodec::new(&config(60));
        let issued = Utc::now() - Duration::seconds(120);
        let token = codec.encode(&identity(), ClaimSet::new(), issued).unwrap();

        assert_eq!(codec.decode(&token, Utc::now()), Err(TokenError::Expired));
        assert!(codec
            .decode_allowing_expired(&token, Duration::seconds(3500), Utc::now())
            .is_ok());
        assert_eq!(
            codec.decode_allowing_expired(&token, Duration::seconds(10), Utc::now()),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn expiry_is_judged_against_the_supplied_time() {
        let codec = JwtCodec::new(&config(60));
        let issued = Utc::now() + Duration::days(1);
        let token = codec.encode(&identity(), ClaimSet::new(), issued).unwrap();

        // 按签发方的时间仍有效，按系统时间则远未过期
        assert!(codec.decode(&token, issued).is_ok());
        assert_eq!(
            codec.decode(&token, issued + Duration::seconds(61)),
            Err(TokenError::Expired)
        );
        let grace = Duration::seconds(120);
        assert!(codec
            .decode_allowing_expired(&token, grace, issued + Duration::seconds(150))
            .is_ok());
        assert_eq!(
            codec.decode_allowing_expired(&token, grace, issued + Duration::seconds(200)),
            Err(TokenError::Expired)
        );
    }
}
