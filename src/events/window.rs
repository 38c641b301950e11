use serde::{Deserialize, Serialize};
use std::fmt;

/// Снимок окна, полученный от оконной системы (только чтение)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowView {
    /// Идентификатор окна в оконной системе (XID и т.п.)
    pub id: u64,
    pub title: String,
    pub class: String,
    /// PID процесса-владельца, 0 если неизвестен
    pub pid: u32,
    /// PID "приложения", если оконная система группирует окна по нему
    pub app_pid: Option<u32>,
}

impl WindowView {
    pub fn new(id: u64, title: String) -> Self {
        Self {
            id,
            title,
            class: String::new(),
            pid: 0,
            app_pid: None,
        }
    }

    pub fn with_class(mut self, class: String) -> Self {
        self.class = class;
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_app_pid(mut self, app_pid: u32) -> Self {
        self.app_pid = Some(app_pid);
        self
    }

    /// Принадлежит ли окно процессу: напрямую или через PID приложения
    pub fn belongs_to(&self, pid: u32) -> bool {
        pid != 0 && (self.pid == pid || self.app_pid == Some(pid))
    }
}

impl fmt::Display for WindowView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "\"{}\" [pid {}]", self.title, self.pid)
        } else {
            write!(f, "\"{}\" ({}) [pid {}]", self.title, self.class, self.pid)
        }
    }
}

/// Уведомление оконной системы об изменении списка окон
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub window: Option<WindowView>,
    pub timestamp: std::time::Instant,
    pub event_type: WindowEventType,
}

impl WindowEvent {
    pub fn new(window: Option<WindowView>, event_type: WindowEventType) -> Self {
        Self {
            window,
            timestamp: std::time::Instant::now(),
            event_type,
        }
    }

    pub fn window_opened(window: WindowView) -> Self {
        Self::new(Some(window), WindowEventType::WindowOpened)
    }

    pub fn window_closed(window: WindowView) -> Self {
        Self::new(Some(window), WindowEventType::WindowClosed)
    }
}

impl fmt::Display for WindowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.window {
            Some(window) => write!(f, "{:?}: {}", self.event_type, window),
            None => write!(f, "{:?}", self.event_type),
        }
    }
}

/// Тип события окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowEventType {
    WindowOpened,
    WindowClosed,
    ApplicationOpened,
    ApplicationClosed,
}
