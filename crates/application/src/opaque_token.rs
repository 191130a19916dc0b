//! 不透明刷新令牌的生成与指纹
//!
//! 存储只保存令牌的 SHA-256 指纹，明文无法从存储中还原。

use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use domain::RepositoryError;
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};

const TOKEN_BYTES: usize = 32;

/// 生成 256 位随机令牌，URL 安全的 base64 编码
pub fn generate() -> Result<String, RepositoryError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| RepositoryError::storage("system random source unavailable"))?;
    Ok(BASE64URL_NOPAD.encode(&bytes))
}

/// 令牌的十六进制 SHA-256 指纹
pub fn fingerprint(token: &str) -> String {
    HEXLOWER.encode(digest(&SHA256, token.as_bytes()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate().unwrap();
        let b = generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 64);
    }
}
