//! ExecNormalizer: командная строка -> канонический токен
//!
//! Командная строка приходит в двух формах: из `/proc/<pid>/cmdline`
//! (аргументы разделены NUL) и из поля `Exec` лаунчера (разделены пробелом).
//! Токен - это имя исполняемого файла без пути, аргументов и обёрток
//! (sudo, интерпретаторы, звуковые прослойки). Отсутствие токена - это
//! нормальный исход "сопоставить нельзя", а не ошибка.

use crate::error::Result;
use crate::trace_if_enabled;
use once_cell::sync::Lazy;
use regex::Regex;

/// Встроенные обёртки в порядке проверки
const BUILTIN_WRAPPERS: &[&str] = &[
    "gksu",
    "sudo",
    "java",
    "mono",
    "ruby",
    "padsp",
    "aoss",
    r"python(\d\.\d)?",
    "(ba)?sh",
];

/// Суффикс, за которым часто прячут настоящий бинарник позади shell-скрипта
const REAL_SUFFIX: &str = ".real";

static DEFAULT_NORMALIZER: Lazy<DefaultExecNormalizer> = Lazy::new(DefaultExecNormalizer::new);

/// Собирает регистронезависимый шаблон, привязанный к началу и концу поля
pub fn compile_wrapper(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("(?i)^(?:{})$", pattern))?)
}

/// Источник токенов. Выделен в трейт, чтобы кэш процессов можно было
/// тестировать с подменённой нормализацией.
pub trait ExecNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Option<String>;
}

/// Префикс-обёртка: прозрачна для сопоставления, реальный бинарник дальше в строке
#[derive(Debug, Clone)]
pub struct WrapperPrefix {
    pub pattern: String,
    regex: Regex,
}

impl WrapperPrefix {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: compile_wrapper(pattern)?,
        })
    }

    pub fn matches(&self, field: &str) -> bool {
        self.regex.is_match(field)
    }
}

#[derive(Debug, Clone)]
pub struct DefaultExecNormalizer {
    wrappers: Vec<WrapperPrefix>,
}

impl Default for DefaultExecNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultExecNormalizer {
    pub fn new() -> Self {
        let wrappers = BUILTIN_WRAPPERS
            .iter()
            .filter_map(|pattern| WrapperPrefix::new(pattern).ok())
            .collect();
        Self { wrappers }
    }

    /// Встроенный список плюс пользовательские шаблоны из конфигурации
    pub fn with_extra_wrappers(extra: &[String]) -> Result<Self> {
        let mut normalizer = Self::new();
        for pattern in extra {
            normalizer.wrappers.push(WrapperPrefix::new(pattern)?);
        }
        Ok(normalizer)
    }

    pub fn wrappers(&self) -> &[WrapperPrefix] {
        &self.wrappers
    }

    /// Первая сработавшая обёртка (проверка по порядку, до первого совпадения)
    pub fn matching_wrapper(&self, field: &str) -> Option<&WrapperPrefix> {
        self.wrappers.iter().find(|wrapper| wrapper.matches(field))
    }
}

impl ExecNormalizer for DefaultExecNormalizer {
    fn normalize(&self, raw: &str) -> Option<String> {
        let line = raw.to_lowercase();
        let separator = field_separator(&line);
        let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if line.is_empty() {
            return None;
        }

        for field in line.split(separator) {
            // Аргументы бесполезны
            if field.is_empty() || field.starts_with('-') {
                continue;
            }

            let name = basename(field);
            if name.is_empty() || name.starts_with('-') {
                continue;
            }

            // Цепочки обёрток (`sudo mono app.exe`) пропускаются целиком
            if let Some(wrapper) = self.matching_wrapper(name) {
                trace_if_enabled!("Пропускаем обёртку '{}' (шаблон {})", name, wrapper.pattern);
                continue;
            }

            let name = name.strip_suffix(REAL_SUFFIX).unwrap_or(name);
            if name.is_empty() || self.matching_wrapper(name).is_some() {
                continue;
            }

            return Some(name.to_string());
        }

        None
    }
}

/// Нормализация встроенным набором обёрток
pub fn normalize(raw: &str) -> Option<String> {
    DEFAULT_NORMALIZER.normalize(raw)
}

/// Ключ для ремапа по имени: первое поле сокращается до basename, остаток
/// строки сохраняется. На сам токен не влияет.
pub fn remap_key(raw: &str) -> Option<String> {
    let line = raw.to_lowercase();
    let separator = field_separator(&line);
    let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if line.is_empty() {
        return None;
    }

    if !line.starts_with('/') {
        return Some(line.to_string());
    }

    match line.split_once(separator) {
        Some((first, rest)) => Some(format!("{} {}", basename(first), rest)),
        None => Some(basename(line).to_string()),
    }
}

/// NUL в строке означает форму из таблицы процессов, иначе - форму лаунчера
fn field_separator(line: &str) -> char {
    if line.contains('\0') {
        '\0'
    } else {
        ' '
    }
}

/// Хвост пути: после последнего `/`, затем после последнего `\` (пути Wine)
fn basename(field: &str) -> &str {
    let field = field.rsplit('/').next().unwrap_or(field);
    field.rsplit('\\').next().unwrap_or(field)
}
