//! Defaults for `import`, layered system config -> repo-local config, read
//! via the `config` crate. CLI flags always take precedence; this only
//! fills in values the caller didn't pass explicitly.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::git::driver;

#[derive(Debug, Default, Deserialize)]
pub struct ImportDefaults {
    pub search_refs: Option<Vec<String>>,
    pub strategy: Option<String>,
    pub import_branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    import: ImportDefaults,
}

fn repo_root() -> Option<PathBuf> {
    driver::run(&["rev-parse", "--show-toplevel"])
        .ok()
        .map(|out| PathBuf::from(out.stdout.trim()))
}

fn local_config_path() -> Option<PathBuf> {
    let path = repo_root()?.join(".gitupstreamconfig");
    path.is_file().then_some(path)
}

fn system_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Some(Path::new(&xdg).join("git-upstream").join("config.toml"));
    }
    dirs_next::home_dir().map(|home| home.join(".config").join("git-upstream").join("config.toml"))
}

/// Builds the layered config: system-wide, then repo-local overriding it.
/// Either source may be absent; a missing file is not an error.
fn read_hierarchical_config() -> Result<Config, config::ConfigError> {
    let mut builder = Config::builder();
    if let Some(system_path) = system_config_path() {
        builder = builder.add_source(File::from(system_path).format(FileFormat::Toml).required(false));
    }
    if let Some(local_path) = local_config_path() {
        builder = builder.add_source(File::from(local_path).format(FileFormat::Toml).required(false));
    }
    builder.build()
}

/// Reads the layered `import` defaults. Absence or a parse error is
/// treated as "no defaults" — this is an ambient convenience, not a
/// load-bearing part of the import pipeline.
pub fn read_import_defaults() -> ImportDefaults {
    let config = match read_hierarchical_config() {
        Ok(c) => c,
        Err(e) => {
            log::debug!("ignoring unreadable config: {e}");
            return ImportDefaults::default();
        }
    };
    match config.try_deserialize::<RawConfig>() {
        Ok(cfg) => cfg.import,
        Err(e) => {
            log::debug!("ignoring malformed config: {e}");
            ImportDefaults::default()
        }
    }
}
