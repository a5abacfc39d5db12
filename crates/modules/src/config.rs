//! Engine configuration: module search paths and cache capacity.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment override for the module search path, colon-separated,
/// prepended to the configured directories.
pub const MODULE_PATH_ENV: &str = "CHROMA_MODULE_PATH";

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading the configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Engine configuration, usually read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Ordered module search directories.
	pub search_paths: Vec<PathBuf>,
	/// Result cache bound, in entries.
	pub cache_capacity: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			search_paths: default_search_paths(),
			cache_capacity: chroma_cache::registry::DEFAULT_CAPACITY,
		}
	}
}

fn default_search_paths() -> Vec<PathBuf> {
	let mut dirs = Vec::new();
	if let Some(home) = std::env::var_os("HOME") {
		dirs.push(PathBuf::from(home).join(".local/lib/chroma/modules"));
	}
	dirs.push(PathBuf::from("/usr/local/lib/chroma/modules"));
	dirs.push(PathBuf::from("/usr/lib/chroma/modules"));
	dirs
}

impl EngineConfig {
	/// Loads configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Ok(toml::from_str(&content)?)
	}

	/// Applies the [`MODULE_PATH_ENV`] override, prepending its entries.
	pub fn apply_env(mut self) -> Self {
		if let Ok(list) = std::env::var(MODULE_PATH_ENV) {
			let mut paths: Vec<PathBuf> = list
				.split(':')
				.filter(|segment| !segment.is_empty())
				.map(PathBuf::from)
				.collect();
			paths.append(&mut self.search_paths);
			self.search_paths = paths;
		}
		self
	}
}
