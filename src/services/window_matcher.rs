//! WindowMatcher: окна <-> лаунчеры
//!
//! Жизненный цикл: `new`, затем один `initialize` (строит индекс лаунчеров),
//! затем сколько угодно запросов. Запрос до `initialize` - ошибка вызывающего
//! кода и возвращается как `MatchError::NotInitialized`. Всё остальное
//! ("процесс исчез", "у лаунчера нет Exec", "токен не найден") - обычный
//! результат "нет совпадения".

use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::{MatchError, Result};
use crate::events::{WindowEvent, WindowEventType, WindowView};
use crate::services::exec_normalizer::{DefaultExecNormalizer, ExecNormalizer};
use crate::services::launcher_index::{
    DescriptorReader, DesktopEntryReader, LauncherDescriptor, LauncherIndex,
};
use crate::services::office_suite::{self, OfficeProduct};
use crate::services::process_cache::{ProcFsTable, ProcessExecCache, ProcessTable};
use crate::services::window_source::WindowSource;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Кэшированный список окон; `stale` выставляется уведомлениями оконной системы
struct WindowSnapshot {
    windows: Arc<Vec<WindowView>>,
    stale: bool,
}

pub struct WindowMatcher {
    index: OnceCell<LauncherIndex>,
    reader: Box<dyn DescriptorReader>,
    normalizer: Arc<dyn ExecNormalizer>,
    processes: Mutex<ProcessExecCache>,
    snapshot: Mutex<WindowSnapshot>,
    source: Box<dyn WindowSource>,
}

impl WindowMatcher {
    pub fn new(
        source: Box<dyn WindowSource>,
        table: Box<dyn ProcessTable>,
        normalizer: Arc<dyn ExecNormalizer>,
        reader: Box<dyn DescriptorReader>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            index: OnceCell::new(),
            reader,
            processes: Mutex::new(ProcessExecCache::new(
                table,
                normalizer.clone(),
                refresh_interval,
            )),
            normalizer,
            snapshot: Mutex::new(WindowSnapshot {
                windows: Arc::new(Vec::new()),
                stale: true,
            }),
            source,
        }
    }

    /// Стандартная сборка: `/proc`, .desktop-файлы, обёртки из конфигурации
    pub fn from_config(config: &Config, source: Box<dyn WindowSource>) -> Result<Self> {
        let normalizer = DefaultExecNormalizer::with_extra_wrappers(&config.matching.extra_wrappers)?;
        Ok(Self::new(
            source,
            Box::new(ProcFsTable::new()),
            Arc::new(normalizer),
            Box::new(DesktopEntryReader::new()),
            config.refresh_interval(),
        ))
    }

    /// Построить индекс лаунчеров. Повторные вызовы ничего не делают;
    /// возвращает `true`, если индекс построен именно этим вызовом.
    pub fn initialize(&self, directories: &[PathBuf]) -> bool {
        let mut built = false;
        self.index.get_or_init(|| {
            built = true;
            LauncherIndex::build_all(directories, self.reader.as_ref(), self.normalizer.as_ref())
        });
        if !built {
            debug_if_enabled!("WindowMatcher уже инициализирован, повторный initialize пропущен");
        }
        built
    }

    pub fn is_initialized(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn index(&self) -> Result<&LauncherIndex> {
        self.index.get().ok_or_else(|| {
            error!("Запрос к WindowMatcher до initialize()");
            MatchError::NotInitialized
        })
    }

    /// Уведомление оконной системы: список окон устарел.
    /// Токены процессов здесь не пересчитываются.
    pub fn handle_window_event(&self, event: &WindowEvent) {
        debug_if_enabled!("Событие окна: {}", event);
        self.mark_windows_stale();

        if matches!(
            event.event_type,
            WindowEventType::ApplicationOpened | WindowEventType::ApplicationClosed
        ) {
            // Состав процессов изменился, ограничение частоты снимаем
            self.processes.lock().invalidate();
        }
    }

    pub fn mark_windows_stale(&self) {
        self.snapshot.lock().stale = true;
    }

    /// Текущий снимок окон; перечитывается из источника только если устарел
    pub fn current_windows(&self) -> Arc<Vec<WindowView>> {
        let mut snapshot = self.snapshot.lock();
        if snapshot.stale {
            match self.source.current_windows() {
                Ok(windows) => {
                    debug_if_enabled!("Снимок окон обновлён: {} окон", windows.len());
                    snapshot.windows = Arc::new(windows);
                    snapshot.stale = false;
                }
                Err(e) => warn!("Не удалось получить список окон, используем прежний: {}", e),
            }
        }
        snapshot.windows.clone()
    }

    /// Явное обновление кэша процессов на момент `now`
    pub fn refresh_processes(&self, now: Instant) -> bool {
        let windows = self.current_windows();
        self.processes.lock().refresh(now, &windows)
    }

    /// Окна, принадлежащие лаунчеру
    pub fn windows_for_launcher(&self, descriptor: &LauncherDescriptor) -> Result<Vec<WindowView>> {
        self.index()?;
        match descriptor.exec.as_deref() {
            Some(exec) => self.windows_for_exec(exec),
            None => Ok(Vec::new()),
        }
    }

    /// То же по пути к .desktop-файлу; нечитаемый файл даёт пустой результат
    pub fn windows_for_launcher_file(&self, path: &Path) -> Result<Vec<WindowView>> {
        self.index()?;
        match self.reader.read(path) {
            Ok(descriptor) => self.windows_for_launcher(&descriptor),
            Err(e) => {
                warn!("Не удалось прочитать лаунчер {:?}: {}", path, e);
                Ok(Vec::new())
            }
        }
    }

    fn windows_for_exec(&self, exec: &str) -> Result<Vec<WindowView>> {
        self.index()?;
        if exec.trim().is_empty() {
            return Ok(Vec::new());
        }

        let windows = self.current_windows();

        // Исключение OpenOffice: подпродукты неразличимы по командной строке
        if office_suite::is_office_exec(exec) {
            let matched = office_suite::office_windows(exec, &windows);
            debug_if_enabled!("OpenOffice '{}': {} окон по заголовку", exec, matched.len());
            return Ok(matched);
        }

        let Some(token) = self.normalizer.normalize(exec) else {
            return Ok(Vec::new());
        };

        let pids = {
            let mut processes = self.processes.lock();
            processes.refresh(Instant::now(), &windows);
            processes.pids_matching(&token)
        };

        let mut seen = HashSet::new();
        let matched: Vec<WindowView> = windows
            .iter()
            .filter(|window| pids.iter().any(|pid| window.belongs_to(*pid)))
            .filter(|window| seen.insert(window.id))
            .cloned()
            .collect();

        debug_if_enabled!(
            "Токен '{}': {} процессов, {} окон",
            token,
            pids.len(),
            matched.len()
        );
        Ok(matched)
    }

    /// Лаунчер, которому принадлежит окно
    pub fn launcher_for_window(&self, window: &WindowView) -> Result<Option<PathBuf>> {
        let index = self.index()?;
        if window.pid == 0 {
            return Ok(None);
        }

        let Some(token) = self.token_for_window(window) else {
            return Ok(None);
        };

        let launcher = index.lookup(&token).map(Path::to_path_buf);
        debug_if_enabled!("Окно {}: токен '{}' -> {:?}", window, token, launcher);
        Ok(launcher)
    }

    /// Токен окна по свежей командной строке его PID, а если она недоступна,
    /// по PID приложения. Кэш здесь не используется: PID мог быть переиспользован.
    fn token_for_window(&self, window: &WindowView) -> Option<String> {
        let windows = self.current_windows();
        let processes = self.processes.lock();

        [Some(window.pid), window.app_pid]
            .into_iter()
            .flatten()
            .filter(|pid| *pid != 0)
            .find_map(|pid| {
                processes
                    .command_line_of(pid)
                    .map(|raw| processes.derive_token(pid, &raw, &windows))
            })
            .flatten()
    }

    /// Лаунчер по классу окна через desktop-id
    pub fn launcher_for_class(&self, class: &str) -> Result<Option<PathBuf>> {
        let index = self.index()?;
        if class.is_empty() {
            return Ok(None);
        }
        Ok(index.lookup_desktop_id(class).map(Path::to_path_buf))
    }

    /// Обратное направление исключения OpenOffice: подпродукт по заголовку
    pub fn office_launcher_for_window(&self, window: &WindowView) -> Result<Option<PathBuf>> {
        let index = self.index()?;
        if !office_suite::is_office_window(window) {
            return Ok(None);
        }
        Ok(OfficeProduct::from_title(&window.title)
            .and_then(|product| index.office_launcher(product))
            .map(Path::to_path_buf))
    }
}

impl Drop for WindowMatcher {
    fn drop(&mut self) {
        info!("WindowMatcher завершает работу");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process_cache::DEFAULT_REFRESH_INTERVAL;
    use std::collections::HashMap;
    use std::fs;

    #[derive(Clone, Default)]
    struct FakeWindows {
        windows: Arc<Mutex<Vec<WindowView>>>,
        reads: Arc<Mutex<usize>>,
    }

    impl WindowSource for FakeWindows {
        fn current_windows(&self) -> Result<Vec<WindowView>> {
            *self.reads.lock() += 1;
            Ok(self.windows.lock().clone())
        }
    }

    struct FailingWindows;

    impl WindowSource for FailingWindows {
        fn current_windows(&self) -> Result<Vec<WindowView>> {
            Err(MatchError::ServiceUnavailable("нет дисплея".to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct FakeTable {
        processes: Arc<Mutex<HashMap<u32, String>>>,
    }

    impl ProcessTable for FakeTable {
        fn enumerate_processes(&self) -> Vec<u32> {
            self.processes.lock().keys().copied().collect()
        }

        fn command_line_of(&self, pid: u32) -> Option<String> {
            self.processes.lock().get(&pid).cloned()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        launchers: PathBuf,
        windows: FakeWindows,
        table: FakeTable,
        matcher: WindowMatcher,
    }

    fn fixture(
        launchers: &[(&str, &str)],
        processes: &[(u32, &str)],
        windows: Vec<WindowView>,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for (file, exec) in launchers {
            fs::write(
                dir.path().join(file),
                format!("[Desktop Entry]\nName={}\nExec={}\n", file, exec),
            )
            .unwrap();
        }

        let source = FakeWindows::default();
        *source.windows.lock() = windows;
        let table = FakeTable::default();
        for (pid, cmdline) in processes {
            table.processes.lock().insert(*pid, cmdline.to_string());
        }

        let matcher = WindowMatcher::new(
            Box::new(source.clone()),
            Box::new(table.clone()),
            Arc::new(DefaultExecNormalizer::new()),
            Box::new(DesktopEntryReader::new()),
            DEFAULT_REFRESH_INTERVAL,
        );

        Fixture {
            launchers: dir.path().to_path_buf(),
            _dir: dir,
            windows: source,
            table,
            matcher,
        }
    }

    fn ids(windows: &[WindowView]) -> Vec<u64> {
        windows.iter().map(|w| w.id).collect()
    }

    #[test]
    fn test_end_to_end_matching() {
        let w1 = WindowView::new(1, "Foo".to_string()).with_pid(101);
        let w2 = WindowView::new(2, "Bar".to_string()).with_pid(102);
        let f = fixture(
            &[("a.desktop", "/usr/bin/foo"), ("b.desktop", "/usr/bin/bar --x")],
            &[(101, "/usr/bin/foo"), (102, "sudo /usr/bin/bar.real")],
            vec![w1.clone(), w2.clone()],
        );
        assert!(f.matcher.initialize(&[f.launchers.clone()]));

        let a = f.launchers.join("a.desktop");
        let b = f.launchers.join("b.desktop");

        assert_eq!(ids(&f.matcher.windows_for_launcher_file(&a).unwrap()), vec![1]);
        assert_eq!(ids(&f.matcher.windows_for_launcher_file(&b).unwrap()), vec![2]);
        assert_eq!(f.matcher.launcher_for_window(&w2).unwrap(), Some(b));
        assert_eq!(f.matcher.launcher_for_window(&w1).unwrap(), Some(a));
    }

    #[test]
    fn test_reused_pid_gets_current_launcher() {
        let window = WindowView::new(1, "Foo".to_string()).with_pid(101);
        let f = fixture(
            &[("a.desktop", "/usr/bin/foo"), ("b.desktop", "/usr/bin/bar --x")],
            &[(101, "/usr/bin/foo")],
            vec![window.clone()],
        );
        f.matcher.initialize(&[f.launchers.clone()]);
        let t0 = Instant::now();
        assert!(f.matcher.refresh_processes(t0));
        assert_eq!(
            f.matcher.launcher_for_window(&window).unwrap(),
            Some(f.launchers.join("a.desktop"))
        );

        // Процесс завершился, PID 101 достался другой программе
        f.table.processes.lock().insert(101, "/usr/bin/bar".to_string());
        f.matcher.handle_window_event(&WindowEvent::new(None, WindowEventType::ApplicationClosed));
        f.matcher.handle_window_event(&WindowEvent::new(None, WindowEventType::ApplicationOpened));
        f.matcher.refresh_processes(t0 + Duration::from_millis(250));

        let reused = WindowView::new(2, "Bar".to_string()).with_pid(101);
        assert_eq!(
            f.matcher.launcher_for_window(&reused).unwrap(),
            Some(f.launchers.join("b.desktop"))
        );
    }

    #[test]
    fn test_window_pid_wins_over_application_pid() {
        let window = WindowView::new(1, "Bar".to_string()).with_pid(20).with_app_pid(10);
        let orphan = WindowView::new(2, "Foo".to_string()).with_pid(30).with_app_pid(10);
        let f = fixture(
            &[("a.desktop", "/usr/bin/foo"), ("b.desktop", "/usr/bin/bar")],
            &[(10, "/usr/bin/foo")],
            vec![window.clone(), orphan.clone()],
        );
        f.matcher.initialize(&[f.launchers.clone()]);
        assert!(f.matcher.refresh_processes(Instant::now()));
        // PID 20 появился внутри интервала и в кэш ещё не попал
        f.table.processes.lock().insert(20, "/usr/bin/bar".to_string());

        assert_eq!(
            f.matcher.launcher_for_window(&window).unwrap(),
            Some(f.launchers.join("b.desktop"))
        );
        assert_eq!(
            f.matcher.launcher_for_window(&orphan).unwrap(),
            Some(f.launchers.join("a.desktop"))
        );
    }

    #[test]
    fn test_queries_before_initialize_fail() {
        let f = fixture(&[], &[], Vec::new());
        let window = WindowView::new(1, "x".to_string()).with_pid(5);

        assert!(matches!(
            f.matcher.launcher_for_window(&window),
            Err(MatchError::NotInitialized)
        ));
        assert!(matches!(
            f.matcher.windows_for_launcher_file(Path::new("/nonexistent.desktop")),
            Err(MatchError::NotInitialized)
        ));
        assert!(!f.matcher.is_initialized());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let f = fixture(&[("a.desktop", "foo")], &[], Vec::new());
        assert!(f.matcher.initialize(&[f.launchers.clone()]));
        assert!(!f.matcher.initialize(&[]));
        assert_eq!(f.matcher.index().unwrap().len(), 1);
    }

    #[test]
    fn test_unmatched_window_is_not_an_error() {
        let unknown = WindowView::new(1, "Tool".to_string()).with_pid(7);
        let no_pid = WindowView::new(2, "Ghost".to_string());
        let vanished = WindowView::new(3, "Gone".to_string()).with_pid(8);
        let f = fixture(
            &[("a.desktop", "/usr/bin/foo")],
            &[(7, "/usr/bin/unrelated")],
            vec![unknown.clone(), no_pid.clone(), vanished.clone()],
        );
        f.matcher.initialize(&[f.launchers.clone()]);

        assert_eq!(f.matcher.launcher_for_window(&unknown).unwrap(), None);
        assert_eq!(f.matcher.launcher_for_window(&no_pid).unwrap(), None);
        assert_eq!(f.matcher.launcher_for_window(&vanished).unwrap(), None);
    }

    #[test]
    fn test_substring_and_application_pid_matching() {
        let main = WindowView::new(1, "Browser".to_string()).with_pid(200);
        let worker = WindowView::new(2, "Dialog".to_string()).with_pid(999).with_app_pid(201);
        let other = WindowView::new(3, "Editor".to_string()).with_pid(300);
        let f = fixture(
            &[("firefox.desktop", "firefox %u")],
            &[
                (200, "/usr/lib/firefox/firefox-bin\0"),
                (201, "/usr/lib/firefox/firefox\0-contentproc\0"),
                (300, "gedit"),
            ],
            vec![main, worker, other],
        );
        f.matcher.initialize(&[f.launchers.clone()]);

        let windows = f
            .matcher
            .windows_for_launcher_file(&f.launchers.join("firefox.desktop"))
            .unwrap();
        assert_eq!(ids(&windows), vec![1, 2]);
    }

    #[test]
    fn test_openoffice_routes_by_title() {
        let writer = WindowView::new(1, "a.odt - OpenOffice.org Writer".to_string())
            .with_class("OpenOffice.org 3.1".to_string())
            .with_pid(50);
        let calc = WindowView::new(2, "b.ods - OpenOffice.org Calc".to_string())
            .with_class("OpenOffice.org 3.1".to_string())
            .with_pid(50);
        let stray = WindowView::new(3, "c.odt - OpenOffice.org Writer".to_string()).with_pid(0);
        let f = fixture(
            &[("writer.desktop", "ooffice -writer %F"), ("calc.desktop", "ooffice -calc %F")],
            &[(50, "/usr/lib/openoffice/program/soffice.bin\0-writer\0")],
            vec![writer.clone(), calc.clone(), stray],
        );
        f.matcher.initialize(&[f.launchers.clone()]);

        let descriptor = LauncherDescriptor {
            path: f.launchers.join("writer.desktop"),
            name: "Writer".to_string(),
            icon: None,
            exec: Some("ooffice -writer %F".to_string()),
        };
        assert_eq!(ids(&f.matcher.windows_for_launcher(&descriptor).unwrap()), vec![1, 3]);

        assert_eq!(
            f.matcher.office_launcher_for_window(&calc).unwrap(),
            Some(f.launchers.join("calc.desktop"))
        );
        assert_eq!(
            f.matcher.office_launcher_for_window(&writer).unwrap(),
            Some(f.launchers.join("writer.desktop"))
        );
    }

    #[test]
    fn test_descriptor_without_exec_matches_nothing() {
        let f = fixture(&[], &[(1, "foo")], vec![WindowView::new(1, "Foo".to_string()).with_pid(1)]);
        f.matcher.initialize(&[f.launchers.clone()]);

        let descriptor = LauncherDescriptor {
            path: PathBuf::from("/x/none.desktop"),
            name: "None".to_string(),
            icon: None,
            exec: None,
        };
        assert!(f.matcher.windows_for_launcher(&descriptor).unwrap().is_empty());
        assert!(f
            .matcher
            .windows_for_launcher_file(&f.launchers.join("missing.desktop"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_window_snapshot_is_reread_only_when_stale() {
        let f = fixture(&[], &[], vec![WindowView::new(1, "One".to_string())]);

        assert_eq!(f.matcher.current_windows().len(), 1);
        f.windows.windows.lock().push(WindowView::new(2, "Two".to_string()));
        assert_eq!(f.matcher.current_windows().len(), 1);
        assert_eq!(*f.windows.reads.lock(), 1);

        f.matcher
            .handle_window_event(&WindowEvent::window_opened(WindowView::new(2, "Two".to_string())));
        assert_eq!(f.matcher.current_windows().len(), 2);
        assert_eq!(*f.windows.reads.lock(), 2);
    }

    #[test]
    fn test_application_events_force_process_rescan() {
        let window = WindowView::new(1, "Bar".to_string()).with_pid(2);
        let f = fixture(&[("bar.desktop", "bar")], &[(1, "foo")], vec![window.clone()]);
        f.matcher.initialize(&[f.launchers.clone()]);
        let t0 = Instant::now();
        assert!(f.matcher.refresh_processes(t0));

        f.table.processes.lock().insert(2, "/usr/bin/bar".to_string());
        assert!(!f.matcher.refresh_processes(t0));

        f.matcher.handle_window_event(&WindowEvent::new(None, WindowEventType::ApplicationOpened));
        assert!(f.matcher.refresh_processes(t0));
        let windows = f
            .matcher
            .windows_for_launcher_file(&f.launchers.join("bar.desktop"))
            .unwrap();
        assert_eq!(ids(&windows), vec![1]);
    }

    #[test]
    fn test_failing_window_source_keeps_empty_snapshot() {
        let matcher = WindowMatcher::new(
            Box::new(FailingWindows),
            Box::new(FakeTable::default()),
            Arc::new(DefaultExecNormalizer::new()),
            Box::new(DesktopEntryReader::new()),
            DEFAULT_REFRESH_INTERVAL,
        );
        matcher.initialize(&[]);

        assert!(matcher.current_windows().is_empty());
        let descriptor = LauncherDescriptor {
            path: PathBuf::from("/x/foo.desktop"),
            name: "Foo".to_string(),
            icon: None,
            exec: Some("foo".to_string()),
        };
        assert!(matcher.windows_for_launcher(&descriptor).unwrap().is_empty());
    }

    #[test]
    fn test_launcher_for_class() {
        let f = fixture(&[("org.gnome.Gedit.desktop", "gedit %U")], &[], Vec::new());
        f.matcher.initialize(&[f.launchers.clone()]);

        assert_eq!(
            f.matcher.launcher_for_class("org.gnome.gedit").unwrap(),
            Some(f.launchers.join("org.gnome.Gedit.desktop"))
        );
        assert_eq!(f.matcher.launcher_for_class("").unwrap(), None);
    }
}
