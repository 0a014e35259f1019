use thiserror::Error;

#[derive(Debug, Error)]
/// Ошибки шлюза удалённых данных.
pub enum GatewayError {
    /// Ошибка HTTP-транспорта (`reqwest`).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Требуется авторизация (отсутствует/некорректен токен).
    #[error("unauthorized")]
    Unauthorized,

    /// Запрошенный ресурс не найден.
    #[error("not found")]
    NotFound,

    /// Некорректный запрос или бизнес-ошибка на стороне бэкенда.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ошибка валидации входных данных до обращения к бэкенду.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// Поле, не прошедшее проверку.
        field: &'static str,
        /// Причина отказа.
        message: &'static str,
    },
}

/// Результат операций шлюза.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Self::Unauthorized
            }
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            _ => {
                let message = message.unwrap_or_else(|| format!("http status {status}"));
                Self::InvalidRequest(message)
            }
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }
}
