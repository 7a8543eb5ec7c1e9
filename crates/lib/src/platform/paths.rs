use std::path::PathBuf;

use crate::consts::{APP_NAME, HOME_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var_os("USERPROFILE").map(PathBuf::from).unwrap_or_default()
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

/// Returns the directory for data files for the application
///
/// `DEVUP_HOME` replaces the whole directory when set.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Some(home) = std::env::var_os(HOME_ENV) {
    return PathBuf::from(home);
  }
  let appdata = std::env::var_os("APPDATA")
    .map(PathBuf::from)
    .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"));
  appdata.join(APP_NAME)
}

/// Returns the directory for data files for the application
///
/// `DEVUP_HOME` replaces the whole directory when set.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Some(home) = std::env::var_os(HOME_ENV) {
    return PathBuf::from(home);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Path of the persisted state document.
pub fn state_file() -> PathBuf {
  data_dir().join("state.json")
}

/// Directory holding per-run session logs.
pub fn logs_dir() -> PathBuf {
  data_dir().join("logs")
}
