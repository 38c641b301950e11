use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::interval;
use tracing::{error, info, warn};

use launcher_match::config::Config;
use launcher_match::services::{create_window_source, normalize, remap_key, WindowMatcher};

#[derive(Parser, Debug)]
#[command(name = "launcher-match")]
#[command(about = "Сопоставление окон и процессов с .desktop-лаунчерами")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "launcher-match.toml")]
    config: String,

    /// Режим сухого запуска (фальшивый список окон)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Показать токен для командной строки
    Normalize {
        command_line: String,
    },
    /// Построить индекс лаунчеров и вывести его
    Index,
    /// Лаунчер для окон процесса
    Launcher {
        pid: u32,
    },
    /// Окна, принадлежащие лаунчеру
    Windows {
        desktop_file: PathBuf,
    },
    /// Следить за окнами и сообщать о смене лаунчеров до Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(config.logging.level.as_str());
    init_tracing(level)?;

    info!("Запуск launcher-match v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Normalize { command_line } = &args.command {
        match normalize(command_line) {
            Some(token) => println!("token: {}", token),
            None => println!("token: <нет>"),
        }
        if let Some(key) = remap_key(command_line) {
            println!("remap: {}", key);
        }
        return Ok(());
    }

    if args.dry_run {
        warn!("Режим сухого запуска - список окон эмулируется");
    }

    let source = create_window_source(&config, args.dry_run)?;
    let matcher = Arc::new(WindowMatcher::from_config(&config, source)?);
    matcher.initialize(&config.launcher_directories());

    match args.command {
        Command::Normalize { .. } => {}
        Command::Index => {
            for (token, path) in matcher.index()?.entries() {
                println!("{}\t{}", token, path.display());
            }
        }
        Command::Launcher { pid } => {
            let windows = matcher.current_windows();
            let owned: Vec<_> = windows.iter().filter(|w| w.belongs_to(pid)).collect();
            if owned.is_empty() {
                warn!("У процесса {} нет окон", pid);
            }
            for window in owned {
                match matcher.launcher_for_window(window)? {
                    Some(path) => println!("{}\t{}", window, path.display()),
                    None => println!("{}\t<нет>", window),
                }
            }
        }
        Command::Windows { desktop_file } => {
            for window in matcher.windows_for_launcher_file(&desktop_file)? {
                println!("{:#x}\t{}", window.id, window);
            }
        }
        Command::Watch => watch(matcher, &config).await?,
    }

    Ok(())
}

async fn watch(matcher: Arc<WindowMatcher>, config: &Config) -> Result<()> {
    info!(
        "Отслеживание окон каждые {} мс",
        config.window.polling_interval_ms
    );

    let mut ticker = interval(config.polling_interval());
    let mut known: HashMap<u64, Option<PathBuf>> = HashMap::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // У wmctrl нет уведомлений, поэтому снимок помечается устаревшим на каждом тике
                matcher.mark_windows_stale();
                let windows = matcher.current_windows();

                let mut seen = HashMap::with_capacity(windows.len());
                for window in windows.iter() {
                    let launcher = match matcher.launcher_for_window(window) {
                        Ok(launcher) => launcher,
                        Err(e) => {
                            error!("Ошибка сопоставления окна {}: {}", window, e);
                            None
                        }
                    };
                    if known.get(&window.id) != Some(&launcher) {
                        match &launcher {
                            Some(path) => info!("{} -> {}", window, path.display()),
                            None => info!("{} -> лаунчер не найден", window),
                        }
                    }
                    seen.insert(window.id, launcher);
                }

                for id in known.keys().filter(|id| !seen.contains_key(*id)) {
                    info!("Окно {:#x} закрыто", id);
                }
                known = seen;
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                    Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
                }
                break;
            }
        }
    }

    info!("launcher-match завершил работу");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
