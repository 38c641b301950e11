use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Некорректный шаблон обёртки: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Не удалось разобрать лаунчер {path:?}: {reason}")]
    Descriptor { path: PathBuf, reason: String },

    #[error("WindowMatcher не инициализирован: вызовите initialize() перед запросами")]
    NotInitialized,

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),
}

impl MatchError {
    pub fn descriptor<T>(path: impl Into<PathBuf>, reason: impl Into<String>) -> Result<T> {
        Err(MatchError::Descriptor {
            path: path.into(),
            reason: reason.into(),
        })
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;

// Удобный макрос для создания ошибок
#[macro_export]
macro_rules! match_error {
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::MatchError::ServiceUnavailable(format!($($arg)*))
    };
}
