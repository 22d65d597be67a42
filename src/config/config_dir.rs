use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use super::error::{ConfigError, ConfigResult};

/// Overrides every other location when set.
const CONFIG_ENV: &str = "ACADEMY_CONFIG";
const CONFIG_FILE: &str = "config.toml";

#[cfg(unix)]
const USER_DIR_ENV: &str = "HOME";
#[cfg(not(unix))]
const USER_DIR_ENV: &str = "APPDATA";

/// Locations a configuration file is looked up at, most specific first.
pub fn config_candidates(use_local: bool) -> Vec<PathBuf> {
    candidates_from(
        use_local,
        std::env::var_os(CONFIG_ENV),
        std::env::var_os(USER_DIR_ENV),
    )
}

fn candidates_from(
    use_local: bool,
    explicit: Option<OsString>,
    user_dir: Option<OsString>,
) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = explicit.map(PathBuf::from).into_iter().collect();

    if let Some(base) = user_dir.filter(|_| !use_local) {
        let base = PathBuf::from(base);
        let base = if cfg!(unix) { base.join(".config") } else { base };
        candidates.push(base.join(crate::APPLICATION_NAME).join(CONFIG_FILE));
    }

    candidates.push(Path::new(".").join(CONFIG_FILE));
    candidates
}

/// First candidate that exists on disk.
pub fn find_config_file(use_local: bool) -> Option<PathBuf> {
    config_candidates(use_local)
        .into_iter()
        .find(|path| path.is_file())
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    let path = find_config_file(use_local).ok_or(ConfigError::ConfigNotFound)?;
    read_config_file(&path)
}

fn read_config_file(path: &Path) -> ConfigResult<Vec<u8>> {
    let path = path.canonicalize().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::ConfigNotFound,
        _ => ConfigError::IoError(e),
    })?;
    tracing::debug!(path = %path.display(), "reading configuration");
    Ok(std::fs::read(path)?)
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn local() -> PathBuf {
        Path::new(".").join(CONFIG_FILE)
    }

    #[test]
    fn debug_builds_only_look_locally() {
        let candidates = candidates_from(true, None, Some(OsString::from("/home/ivy")));
        assert_eq!(candidates, vec![local()]);
    }

    #[test]
    fn user_dir_comes_before_the_working_directory() {
        let candidates = candidates_from(false, None, Some(OsString::from("/home/ivy")));
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with(Path::new(crate::APPLICATION_NAME).join(CONFIG_FILE)));
        assert!(candidates[0].starts_with("/home/ivy"));
        assert_eq!(candidates[1], local());
    }

    #[test]
    fn explicit_path_wins() {
        let candidates = candidates_from(
            true,
            Some(OsString::from("/etc/academy.toml")),
            None,
        );
        assert_eq!(candidates, vec![PathBuf::from("/etc/academy.toml"), local()]);
    }

    #[test]
    fn reads_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&file_path, b"[host]\nbindto = '0.0.0.0:3000'").unwrap();

        let bytes = read_config_file(&file_path).unwrap();
        assert!(bytes.starts_with(b"[host]"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = read_config_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound)));
    }
}
