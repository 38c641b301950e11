//! ProcessExecCache: PID -> токен командной строки
//!
//! Полный проход по таблице процессов дорогой, поэтому он выполняется не чаще
//! одного раза за интервал (по умолчанию 200 мс). При повторном проходе токены
//! уже известных PID переносятся как есть, исчезнувшие PID удаляются, для новых
//! токен вычисляется. Время передаётся снаружи, часы внутри не читаются.

use crate::events::WindowView;
use crate::services::exec_normalizer::ExecNormalizer;
use crate::{debug_if_enabled, trace_if_enabled};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(200);

/// Класс окон, который выставляет SWT вместо имени приложения (Vuze и т.п.)
const SWT_CLASS: &str = "SWT";

/// Таблица процессов
pub trait ProcessTable: Send + Sync {
    /// PID всех живых процессов; ошибки чтения отдельных записей игнорируются
    fn enumerate_processes(&self) -> Vec<u32>;

    /// Сырая командная строка процесса, `None` если процесс исчез или недоступен
    fn command_line_of(&self, pid: u32) -> Option<String>;
}

/// Таблица процессов Linux поверх `/proc`
#[derive(Debug, Clone)]
pub struct ProcFsTable {
    root: PathBuf,
}

impl Default for ProcFsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFsTable {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessTable for ProcFsTable {
    fn enumerate_processes(&self) -> Vec<u32> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Не удалось прочитать {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut pids: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();
        pids
    }

    fn command_line_of(&self, pid: u32) -> Option<String> {
        let bytes = fs::read(self.root.join(pid.to_string()).join("cmdline")).ok()?;
        if bytes.is_empty() {
            // Потоки ядра и зомби
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub struct ProcessExecCache {
    table: Box<dyn ProcessTable>,
    normalizer: Arc<dyn ExecNormalizer>,
    interval: Duration,
    entries: HashMap<u32, String>,
    last_refresh: Option<Instant>,
}

impl ProcessExecCache {
    pub fn new(
        table: Box<dyn ProcessTable>,
        normalizer: Arc<dyn ExecNormalizer>,
        interval: Duration,
    ) -> Self {
        Self {
            table,
            normalizer,
            interval,
            entries: HashMap::new(),
            last_refresh: None,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.last_refresh
            .is_some_and(|last| now.saturating_duration_since(last) < self.interval)
    }

    /// Сбросить ограничение частоты: следующий refresh пройдёт по таблице.
    /// Уже вычисленные токены живых PID при этом сохраняются.
    pub fn invalidate(&mut self) {
        self.last_refresh = None;
    }

    /// Пересобрать кэш, если он старше интервала. `windows` нужен только для
    /// Java-процессов. Возвращает `true`, если проход по таблице выполнялся.
    pub fn refresh(&mut self, now: Instant, windows: &[WindowView]) -> bool {
        if self.is_fresh(now) {
            return false;
        }

        let mut previous = std::mem::take(&mut self.entries);
        let mut entries = HashMap::with_capacity(previous.len());
        let mut kept = 0usize;
        let mut computed = 0usize;

        for pid in self.table.enumerate_processes() {
            if let Some(token) = previous.remove(&pid) {
                entries.insert(pid, token);
                kept += 1;
                continue;
            }

            let Some(raw) = self.table.command_line_of(pid) else {
                continue;
            };

            if let Some(token) = self.derive_token(pid, &raw, windows) {
                trace_if_enabled!("PID {} -> токен '{}'", pid, token);
                entries.insert(pid, token);
                computed += 1;
            }
        }

        debug_if_enabled!(
            "Кэш процессов обновлён: {} сохранено, {} вычислено, {} удалено",
            kept,
            computed,
            previous.len()
        );

        self.entries = entries;
        self.last_refresh = Some(now);
        true
    }

    /// Токен по свежей командной строке PID, с учётом Java-процессов
    pub fn derive_token(&self, pid: u32, raw: &str, windows: &[WindowView]) -> Option<String> {
        if is_java_jar(raw) {
            // В командной строке jar-приложения нет ничего отличительного
            if let Some(hint) = java_window_hint(pid, windows) {
                debug_if_enabled!("PID {}: Java-приложение, токен по окну '{}'", pid, hint);
                return self.normalizer.normalize(&hint);
            }
        }
        self.normalizer.normalize(raw)
    }

    /// Токен PID с обновлением кэша при необходимости
    pub fn token_for(&mut self, pid: u32, now: Instant, windows: &[WindowView]) -> Option<String> {
        self.refresh(now, windows);
        self.entries.get(&pid).cloned()
    }

    /// Токен из текущего состояния кэша, без обновления
    pub fn cached_token(&self, pid: u32) -> Option<&str> {
        self.entries.get(&pid).map(String::as_str)
    }

    /// PID, чей токен содержит `token` как подстроку
    pub fn pids_matching(&self, token: &str) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, cached)| cached.contains(token))
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Прямое чтение командной строки, мимо кэша
    pub fn command_line_of(&self, pid: u32) -> Option<String> {
        self.table.command_line_of(pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_java_jar(raw: &str) -> bool {
    let raw = raw.to_lowercase();
    raw.contains("java") && raw.contains("jar")
}

/// Класс окна процесса, а для SWT - заголовок
fn java_window_hint(pid: u32, windows: &[WindowView]) -> Option<String> {
    windows
        .iter()
        .filter(|window| window.belongs_to(pid))
        .last()
        .map(|window| {
            if window.class == SWT_CLASS {
                window.title.clone()
            } else {
                window.class.clone()
            }
        })
        .filter(|hint| !hint.is_empty())
}
