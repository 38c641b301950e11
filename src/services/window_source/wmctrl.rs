use super::r#trait::WindowSource;
use crate::error::{MatchError, Result};
use crate::events::WindowView;
use crate::{match_error, trace_if_enabled};
use std::process::Command;
use tracing::debug;

/// Список окон через `wmctrl -lpx`
pub struct WmctrlWindowSource;

impl Default for WmctrlWindowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WmctrlWindowSource {
    pub fn new() -> Self {
        Self
    }

    /// Разбор вывода `wmctrl -lpx`:
    /// `<id> <desktop> <pid> <instance.Class> <host> <title...>`.
    /// Строки, которые не удалось разобрать, пропускаются.
    pub fn parse_output(stdout: &str) -> Vec<WindowView> {
        stdout.lines().filter_map(Self::parse_line).collect()
    }

    fn parse_line(line: &str) -> Option<WindowView> {
        let (id, rest) = next_field(line)?;
        let (_desktop, rest) = next_field(rest)?;
        let (pid, rest) = next_field(rest)?;
        let (wm_class, rest) = next_field(rest)?;
        let title = match next_field(rest) {
            Some((_host, title)) => title.trim(),
            None => "",
        };

        let Ok(id) = u64::from_str_radix(id.trim_start_matches("0x"), 16) else {
            trace_if_enabled!("wmctrl: некорректный id окна в строке '{}'", line);
            return None;
        };
        let pid = pid.parse::<u32>().unwrap_or(0);

        let class = match wm_class {
            "N/A" => "",
            wm_class => class_of(wm_class),
        };

        Some(
            WindowView::new(id, title.to_string())
                .with_class(class.to_string())
                .with_pid(pid),
        )
    }
}

/// `instance.Class` -> `Class`. Обе части сами могут содержать точки
/// (`gimp-2.10.Gimp-2.10`), поэтому сначала ищется точка, делящая поле на
/// половины, равные без учёта регистра; иначе берётся хвост после последней.
fn class_of(wm_class: &str) -> &str {
    let halves = wm_class
        .match_indices('.')
        .map(|(dot, _)| (&wm_class[..dot], &wm_class[dot + 1..]))
        .find(|(instance, class)| instance.eq_ignore_ascii_case(class));
    if let Some((_, class)) = halves {
        return class;
    }
    wm_class.rsplit('.').next().unwrap_or(wm_class)
}

/// Первое поле строки и остаток после него
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

impl WindowSource for WmctrlWindowSource {
    fn current_windows(&self) -> Result<Vec<WindowView>> {
        let output = Command::new("wmctrl")
            .args(["-lpx"])
            .output()
            .map_err(|e| {
                debug!("wmctrl не найден или не работает: {}", e);
                match_error!(service_unavailable, "wmctrl не найден: {}", e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MatchError::ServiceUnavailable(format!(
                "wmctrl вернул ошибку: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let windows = Self::parse_output(&stdout);
        debug!("wmctrl вернул {} окон", windows.len());
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wmctrl_output() {
        let stdout = "\
0x03a00003  0 4242   Navigator.Firefox     laptop Mozilla Firefox - Start  Page
0x04000007 -1 1337   xfce4-panel.Xfce4-panel  laptop xfce4-panel
0x05200001  0 0      N/A                   N/A
garbage
";
        let windows = WmctrlWindowSource::parse_output(stdout);
        assert_eq!(windows.len(), 3);

        assert_eq!(windows[0].id, 0x03a00003);
        assert_eq!(windows[0].pid, 4242);
        assert_eq!(windows[0].class, "Firefox");
        assert_eq!(windows[0].title, "Mozilla Firefox - Start  Page");

        assert_eq!(windows[1].class, "Xfce4-panel");
        assert_eq!(windows[1].title, "xfce4-panel");

        assert_eq!(windows[2].pid, 0);
        assert_eq!(windows[2].class, "");
        assert_eq!(windows[2].title, "");
    }

    #[test]
    fn test_dotted_wm_class() {
        let stdout = "\
0x01000001  0 10     gimp-2.10.Gimp-2.10   laptop GNU Image Manipulation Program
0x01000002  0 11     org.gnome.Nautilus.Org.gnome.Nautilus  laptop Home
0x01000003  0 12     sun-awt-X11-XFramePeer.jetbrains-idea  laptop IDE
";
        let windows = WmctrlWindowSource::parse_output(stdout);
        assert_eq!(windows[0].class, "Gimp-2.10");
        assert_eq!(windows[1].class, "Org.gnome.Nautilus");
        assert_eq!(windows[2].class, "jetbrains-idea");
    }
}
