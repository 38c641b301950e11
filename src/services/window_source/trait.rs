use crate::config::Config;
use crate::error::Result;
use crate::events::WindowView;

/// Trait for providers of the current window list
pub trait WindowSource: Send + Sync {
    /// Snapshot of all open windows; may be slightly out of date
    fn current_windows(&self) -> Result<Vec<WindowView>>;
}

/// Factory function to create an appropriate window source based on config and the dry_run flag
pub fn create_window_source(config: &Config, dry_run: bool) -> Result<Box<dyn WindowSource>> {
    if dry_run || config.window.source == "dry_run" {
        Ok(Box::new(super::dry_run::DryRunWindowSource::new()))
    } else {
        Ok(Box::new(super::wmctrl::WmctrlWindowSource::new()))
    }
}
