pub mod exec_normalizer;
pub mod launcher_index;
pub mod office_suite;
pub mod process_cache;
pub mod window_matcher;
pub mod window_source;

pub use exec_normalizer::{normalize, remap_key, DefaultExecNormalizer, ExecNormalizer};
pub use launcher_index::{DescriptorReader, DesktopEntryReader, LauncherDescriptor, LauncherIndex};
pub use process_cache::{ProcFsTable, ProcessExecCache, ProcessTable};
pub use window_matcher::WindowMatcher;
pub use window_source::create_window_source;
