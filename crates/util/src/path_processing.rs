use std::path::PathBuf;

use dirs_next::{config_dir, home_dir};

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// `<config_dir>/nodemap/<file_name>`, or `./nodemap/<file_name>` when the
/// platform has no config directory.
pub fn config_file_path(file_name: &str) -> PathBuf {
    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("nodemap").join(file_name)
}
