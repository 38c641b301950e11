pub mod window;

pub use window::{WindowEvent, WindowEventType, WindowView};
