//! Usage: Unified error model (typed failure taxonomy rendered as `CODE: message` strings).

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error("AUTH_TIMEOUT: no authorization callback received within {timeout_secs}s")]
    AuthorizationTimeout { timeout_secs: u64 },
    #[error("AUTH_STATE_MISMATCH: oauth callback state does not match the request")]
    StateMismatch,
    #[error("AUTH_DENIED: authorization server returned error={0}")]
    AuthorizationDenied(String),
    #[error("AUTH_EXCHANGE_FAILED: {0}")]
    TokenExchangeFailed(String),
    #[error("AUTH_REFRESH_FAILED: {0}")]
    TokenRefreshFailed(String),
    #[error("API_UNAUTHORIZED: request still unauthorized after token refresh")]
    Unauthorized,
    #[error("API_RATE_LIMITED: server asked to wait {wait_seconds:.1}s, above the configured ceiling")]
    RateLimitExceeded { wait_seconds: f64 },
    #[error("API_TRANSIENT: {}", transient_message(.status, .message))]
    TransientServerError { status: Option<u16>, message: String },
    #[error("API_REJECTED: status={status} {message}")]
    ApiRejected { status: u16, message: String },
    #[error("API_MALFORMED_RESPONSE: {0}")]
    MalformedResponse(String),
    #[error("SEC_INVALID_INPUT: {0}")]
    InvalidInput(String),
    #[error("CONFIG_ERROR: {0}")]
    Config(String),
    #[error("IO_ERROR: {0}")]
    Io(String),
    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

fn transient_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("status={status} {message}"),
        None => message.to_string(),
    }
}

impl AppError {
    pub fn code(&self) -> &str {
        match self {
            Self::AuthorizationTimeout { .. } => "AUTH_TIMEOUT",
            Self::StateMismatch => "AUTH_STATE_MISMATCH",
            Self::AuthorizationDenied(_) => "AUTH_DENIED",
            Self::TokenExchangeFailed(_) => "AUTH_EXCHANGE_FAILED",
            Self::TokenRefreshFailed(_) => "AUTH_REFRESH_FAILED",
            Self::Unauthorized => "API_UNAUTHORIZED",
            Self::RateLimitExceeded { .. } => "API_RATE_LIMITED",
            Self::TransientServerError { .. } => "API_TRANSIENT",
            Self::ApiRejected { .. } => "API_REJECTED",
            Self::MalformedResponse(_) => "API_MALFORMED_RESPONSE",
            Self::InvalidInput(_) => "SEC_INVALID_INPUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Other { code, .. } => code,
        }
    }

    /// Soft stops end the run early but leave resumable progress behind.
    pub fn is_soft_stop(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}

fn split_code_message(raw: &str) -> Option<(&str, &str)> {
    let (maybe_code, rest) = raw.trim().split_once(':')?;
    let code = maybe_code.trim();
    if code.is_empty() {
        return None;
    }
    let mut chars = code.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
        return None;
    }
    Some((code, rest.trim()))
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        if let Some((code, rest)) = split_code_message(&value) {
            let message = if rest.is_empty() { value.trim() } else { rest };
            return AppError::Other {
                code: code.to_string(),
                message: message.to_string(),
            };
        }
        AppError::Other {
            code: "INTERNAL_ERROR".to_string(),
            message: value,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value.to_string())
    }
}
