use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::LazyLock;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").expect("valid username regex")
});

/// 验证用户名：3-32 位字母、数字或 `_ . -`
pub fn validate_username(username: &str) -> AppResult<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::ValidationError(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".to_string(),
        ));
    }
    Ok(())
}
