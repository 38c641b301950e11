//! Исключение для OpenOffice.org
//!
//! Все приложения пакета запускаются одним и тем же `ooffice`, поэтому
//! токены командной строки у них неразличимы. Окна распределяются по
//! подпродуктам по заголовку, в обход общего сопоставления токенов.
//! Эвристика хрупкая; для современных форков пакета не обобщается.

use crate::events::WindowView;

/// Признак пакета в командной строке лаунчера
const OFFICE_EXEC_MARKER: &str = "ooffice";

/// Префикс класса окон пакета
const OFFICE_CLASS_PREFIX: &str = "OpenOffice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfficeProduct {
    Writer,
    Math,
    Calc,
    Impress,
    Draw,
}

impl OfficeProduct {
    /// Порядок проверки ключевых слов в командной строке
    pub const ALL: [OfficeProduct; 5] = [
        OfficeProduct::Writer,
        OfficeProduct::Math,
        OfficeProduct::Calc,
        OfficeProduct::Impress,
        OfficeProduct::Draw,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            OfficeProduct::Writer => "writer",
            OfficeProduct::Math => "math",
            OfficeProduct::Calc => "calc",
            OfficeProduct::Impress => "impress",
            OfficeProduct::Draw => "draw",
        }
    }

    /// Строка, которую пакет дописывает в заголовок окна
    pub fn title_marker(self) -> &'static str {
        match self {
            OfficeProduct::Writer => "OpenOffice.org Writer",
            OfficeProduct::Math => "OpenOffice.org Math",
            OfficeProduct::Calc => "OpenOffice.org Calc",
            OfficeProduct::Impress => "OpenOffice.org Impress",
            OfficeProduct::Draw => "OpenOffice.org Draw",
        }
    }

    pub fn from_exec(exec: &str) -> Option<Self> {
        let exec = exec.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|product| exec.contains(product.keyword()))
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|product| title.ends_with(product.title_marker()))
    }
}

pub fn is_office_exec(exec: &str) -> bool {
    exec.to_lowercase().contains(OFFICE_EXEC_MARKER)
}

pub fn is_office_window(window: &WindowView) -> bool {
    window.class.starts_with(OFFICE_CLASS_PREFIX)
}

/// Окна подпродукта, на который указывает командная строка лаунчера.
/// PID окон не учитывается.
pub fn office_windows(exec: &str, windows: &[WindowView]) -> Vec<WindowView> {
    let Some(product) = OfficeProduct::from_exec(exec) else {
        return Vec::new();
    };

    windows
        .iter()
        .filter(|window| window.title.contains(product.title_marker()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u64, title: &str, pid: u32) -> WindowView {
        WindowView::new(id, title.to_string())
            .with_class("OpenOffice.org 3.1".to_string())
            .with_pid(pid)
    }

    #[test]
    fn test_product_routing_from_exec() {
        assert_eq!(OfficeProduct::from_exec("ooffice -writer %F"), Some(OfficeProduct::Writer));
        assert_eq!(OfficeProduct::from_exec("ooffice -CALC %U"), Some(OfficeProduct::Calc));
        assert_eq!(OfficeProduct::from_exec("ooffice -draw"), Some(OfficeProduct::Draw));
        assert_eq!(OfficeProduct::from_exec("ooffice %U"), None);
        assert!(is_office_exec("/usr/bin/OOffice -impress"));
        assert!(!is_office_exec("libreoffice --writer"));
    }

    #[test]
    fn test_writer_windows_ignore_pid() {
        let windows = vec![
            window(1, "report.odt - OpenOffice.org Writer", 10),
            window(2, "budget.ods - OpenOffice.org Calc", 10),
            window(3, "notes.odt - OpenOffice.org Writer", 99),
            WindowView::new(4, "Firefox".to_string()).with_pid(10),
        ];

        let matched = office_windows("ooffice -writer %F", &windows);
        let ids: Vec<u64> = matched.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(office_windows("ooffice", &windows).is_empty());
    }

    #[test]
    fn test_product_from_title() {
        assert_eq!(
            OfficeProduct::from_title("slides.odp - OpenOffice.org Impress"),
            Some(OfficeProduct::Impress)
        );
        assert_eq!(OfficeProduct::from_title("OpenOffice.org Writer - draft"), None);
        assert!(is_office_window(&window(1, "x", 1)));
    }
}
