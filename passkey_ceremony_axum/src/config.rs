use std::sync::LazyLock;

/// Name of the session cookie set on login.
/// Default: "pkc_session"
pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "pkc_session".to_string())
});

pub const CEREMONY_TOKEN_HEADER: &str = "x-ceremony-token";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
