//! LauncherIndex: токен -> путь к .desktop-файлу
//!
//! Строится один раз при старте и дальше только читается: каталог лаунчеров
//! считается неизменным на время работы процесса.

use crate::debug_if_enabled;
use crate::error::{MatchError, Result};
use crate::services::exec_normalizer::ExecNormalizer;
use crate::services::office_suite::{self, OfficeProduct};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DESKTOP_ENTRY_GROUP: &str = "[Desktop Entry]";
const DESKTOP_EXTENSION: &str = "desktop";

/// Разобранный лаунчер
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub icon: Option<String>,
    /// Поле `Exec`; без него лаунчер не сопоставляется
    pub exec: Option<String>,
}

impl LauncherDescriptor {
    /// Desktop-id: имя файла без `.desktop`, в нижнем регистре
    pub fn desktop_id(&self) -> Option<String> {
        desktop_id_for(&self.path)
    }
}

fn desktop_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_lowercase())
}

/// Чтение лаунчера с диска
pub trait DescriptorReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<LauncherDescriptor>;
}

/// Читатель freedesktop .desktop-файлов: группа `[Desktop Entry]`,
/// ключи `Name`, `Icon`, `Exec`. Локализованные варианты ключей игнорируются.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopEntryReader;

impl DesktopEntryReader {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(path: &Path, content: &str) -> Result<LauncherDescriptor> {
        let mut name: Option<&str> = None;
        let mut icon: Option<&str> = None;
        let mut exec: Option<&str> = None;
        let mut in_desktop_entry = false;
        let mut seen_group = false;

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with('[') {
                in_desktop_entry = trimmed == DESKTOP_ENTRY_GROUP;
                seen_group |= in_desktop_entry;
                continue;
            }

            if !in_desktop_entry || trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return MatchError::descriptor(path, format!("строка без '=': {}", trimmed));
            };

            match key.trim() {
                "Name" => name = Some(value.trim()),
                "Icon" => icon = Some(value.trim()),
                "Exec" => exec = Some(value.trim()),
                _ => {}
            }
        }

        if !seen_group {
            return MatchError::descriptor(path, "нет группы [Desktop Entry]");
        }

        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => desktop_id_for(path).unwrap_or_default(),
        };

        Ok(LauncherDescriptor {
            path: path.to_path_buf(),
            name,
            icon: icon.filter(|i| !i.is_empty()).map(str::to_string),
            exec: exec.filter(|e| !e.is_empty()).map(str::to_string),
        })
    }
}

impl DescriptorReader for DesktopEntryReader {
    fn read(&self, path: &Path) -> Result<LauncherDescriptor> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }
}

#[derive(Debug, Default, Clone)]
pub struct LauncherIndex {
    by_token: HashMap<String, PathBuf>,
    by_desktop_id: HashMap<String, PathBuf>,
    office: HashMap<OfficeProduct, PathBuf>,
}

impl LauncherIndex {
    /// Индекс одного каталога (без рекурсии)
    pub fn build(
        directory: &Path,
        reader: &dyn DescriptorReader,
        normalizer: &dyn ExecNormalizer,
    ) -> Self {
        let mut index = Self::default();
        index.scan_directory(directory, reader, normalizer);
        info!("Индекс лаунчеров {:?}: {} токенов", directory, index.len());
        index
    }

    /// Индекс нескольких каталогов, перечисленных от самого приоритетного.
    /// Сканируются в обратном порядке, чтобы при совпадении токенов
    /// побеждал более приоритетный каталог.
    pub fn build_all(
        directories: &[PathBuf],
        reader: &dyn DescriptorReader,
        normalizer: &dyn ExecNormalizer,
    ) -> Self {
        let mut index = Self::default();
        for directory in directories.iter().rev() {
            index.scan_directory(directory, reader, normalizer);
        }
        info!(
            "Индекс лаунчеров построен: {} токенов из {} каталогов",
            index.len(),
            directories.len()
        );
        index
    }

    fn scan_directory(
        &mut self,
        directory: &Path,
        reader: &dyn DescriptorReader,
        normalizer: &dyn ExecNormalizer,
    ) {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Каталог лаунчеров {:?} недоступен: {}", directory, e);
                return;
            }
        };

        // Сортировка делает last-write-wins воспроизводимым
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().and_then(|ext| ext.to_str()) == Some(DESKTOP_EXTENSION)
                    && path.is_file()
            })
            .collect();
        files.sort();

        for path in files {
            match reader.read(&path) {
                Ok(descriptor) => self.insert(&descriptor, normalizer),
                Err(e) => warn!("Пропускаем лаунчер {:?}: {}", path, e),
            }
        }
    }

    /// Добавить лаунчер; лаунчер без `Exec` или без токена пропускается
    pub fn insert(&mut self, descriptor: &LauncherDescriptor, normalizer: &dyn ExecNormalizer) {
        let Some(exec) = descriptor.exec.as_deref() else {
            debug_if_enabled!("Лаунчер {:?} без Exec", descriptor.path);
            return;
        };

        let Some(token) = normalizer.normalize(exec) else {
            debug_if_enabled!("Лаунчер {:?}: Exec '{}' не дал токена", descriptor.path, exec);
            return;
        };

        debug_if_enabled!("Лаунчер {:?} -> токен '{}'", descriptor.path, token);
        self.by_token.insert(token, descriptor.path.clone());

        if let Some(id) = descriptor.desktop_id() {
            self.by_desktop_id.insert(id, descriptor.path.clone());
        }

        if office_suite::is_office_exec(exec) {
            if let Some(product) = OfficeProduct::from_exec(exec) {
                self.office.insert(product, descriptor.path.clone());
            }
        }
    }

    /// Точный поиск по токену
    pub fn lookup(&self, token: &str) -> Option<&Path> {
        self.by_token.get(token).map(PathBuf::as_path)
    }

    /// Поиск по desktop-id (регистронезависимо)
    pub fn lookup_desktop_id(&self, id: &str) -> Option<&Path> {
        self.by_desktop_id
            .get(&id.to_lowercase())
            .map(PathBuf::as_path)
    }

    pub fn office_launcher(&self, product: OfficeProduct) -> Option<&Path> {
        self.office.get(&product).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Пары токен -> путь, отсортированные по токену
    pub fn entries(&self) -> Vec<(&str, &Path)> {
        let mut entries: Vec<(&str, &Path)> = self
            .by_token
            .iter()
            .map(|(token, path)| (token.as_str(), path.as_path()))
            .collect();
        entries.sort();
        entries
    }
}
