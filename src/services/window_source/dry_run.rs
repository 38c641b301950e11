use super::r#trait::WindowSource;
use crate::error::Result;
use crate::events::WindowView;
use tracing::info;

/// Источник с фиксированным набором фальшивых окон для сухого запуска.
/// Окна приписаны текущему процессу, чтобы у них был живой PID.
pub struct DryRunWindowSource {
    pid: u32,
}

impl Default for DryRunWindowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunWindowSource {
    pub fn new() -> Self {
        info!("Dry-run режим - окна эмулируются");
        Self {
            pid: std::process::id(),
        }
    }
}

impl WindowSource for DryRunWindowSource {
    fn current_windows(&self) -> Result<Vec<WindowView>> {
        let fake_windows = [
            ("Terminal - dry_run", "DryRun"),
            ("Browser - dry_run", "DryRun"),
            ("report.odt - OpenOffice.org Writer", "OpenOffice.org 3.1"),
        ];

        Ok(fake_windows
            .iter()
            .enumerate()
            .map(|(i, (title, class))| {
                WindowView::new(i as u64 + 1, title.to_string())
                    .with_class(class.to_string())
                    .with_pid(self.pid)
            })
            .collect())
    }
}
