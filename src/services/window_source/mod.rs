//! WindowSource: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for producing a snapshot of the
//! currently open windows (id/title/class/pid). They MUST NOT contain any matching logic;
//! all launcher decisions are made by WindowMatcher.

mod dry_run;
mod r#trait;
mod wmctrl;

pub use self::dry_run::DryRunWindowSource;
pub use self::r#trait::{create_window_source, WindowSource};
pub use self::wmctrl::WmctrlWindowSource;
