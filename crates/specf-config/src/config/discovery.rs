//! Locates the config file, if any: explicit env var, then CWD, then the
//! user's config directory. Returns `None` rather than erroring when no
//! file is found — file-backed config is optional.

use camino::Utf8PathBuf;

pub const CONFIG_FILE_NAME: &str = "spec-factory.toml";

#[must_use]
pub fn discover_config_path() -> Option<Utf8PathBuf> {
    if let Ok(p) = std::env::var("SPEC_FACTORY_CONFIG") {
        let path = Utf8PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_candidate = Utf8PathBuf::from(CONFIG_FILE_NAME);
    if cwd_candidate.exists() {
        return Some(cwd_candidate);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("spec-factory").join("config.toml");
        if candidate.exists() {
            return Utf8PathBuf::from_path_buf(candidate).ok();
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_var_and_files_returns_none() {
        // SPEC_FACTORY_CONFIG unset in CI; cwd/config-dir files are not
        // part of this test's fixtures, so discovery should find nothing
        // unless the test runner's own environment happens to have one.
        // We only assert the function doesn't panic here.
        let _ = discover_config_path();
    }
}
