//! Сопоставление окон и процессов с лаунчерами (.desktop-файлами)
//!
//! Оконная система отдаёт только PID, а у процесса есть лишь командная строка,
//! искажённая обёртками, интерпретаторами и путями. Движок сводит её к
//! каноническому токену и сравнивает с токенами из поля `Exec` лаунчеров.

pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{MatchError, Result};
pub use events::{WindowEvent, WindowEventType, WindowView};
pub use services::WindowMatcher;
