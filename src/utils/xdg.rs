use std::path::PathBuf;

const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";

/// Каталоги `applications/` по спецификации XDG, от самого приоритетного
pub fn application_dirs() -> Vec<PathBuf> {
    application_dirs_from(
        std::env::var("XDG_DATA_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
        std::env::var("XDG_DATA_DIRS").ok().as_deref(),
    )
}

pub fn application_dirs_from(
    data_home: Option<&str>,
    home: Option<&str>,
    data_dirs: Option<&str>,
) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    match data_home.filter(|d| !d.is_empty()) {
        Some(data_home) => dirs.push(PathBuf::from(data_home)),
        None => {
            if let Some(home) = home.filter(|h| !h.is_empty()) {
                dirs.push(PathBuf::from(home).join(".local/share"));
            }
        }
    }

    let data_dirs = data_dirs.filter(|d| !d.is_empty()).unwrap_or(DEFAULT_DATA_DIRS);
    dirs.extend(
        data_dirs
            .split(':')
            .filter(|d| !d.is_empty())
            .map(PathBuf::from),
    );

    let mut result: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let dir = dir.join("applications");
        if !result.contains(&dir) {
            result.push(dir);
        }
    }
    result
}
