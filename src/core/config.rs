//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.

use std::path::PathBuf;
use std::str::FromStr;

use crate::core::auto_layout::LayoutConfig;
use crate::core::geometry::Vec2;

pub const DEFAULT_STORAGE_DIR: &str = ".erd-data";
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1280.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory of the file-backed project store
    pub storage_dir: PathBuf,

    /// Max undo snapshots kept per project, `None` for unbounded
    pub history_limit: Option<usize>,

    /// Primary viewport size, in pixels
    pub viewport_width: f64,
    pub viewport_height: f64,

    /// Force simulation tuning
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            history_limit: None,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            storage_dir: lookup("ERD_STORAGE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            history_limit: parse_var(&lookup, "ERD_HISTORY_LIMIT").or(defaults.history_limit),
            viewport_width: parse_var(&lookup, "ERD_VIEWPORT_WIDTH")
                .filter(|w: &f64| *w > 0.0)
                .unwrap_or(defaults.viewport_width),
            viewport_height: parse_var(&lookup, "ERD_VIEWPORT_HEIGHT")
                .filter(|h: &f64| *h > 0.0)
                .unwrap_or(defaults.viewport_height),
            layout: LayoutConfig {
                link_distance: parse_var(&lookup, "ERD_LINK_DISTANCE")
                    .filter(|d: &f64| *d > 0.0)
                    .unwrap_or(defaults.layout.link_distance),
                ..defaults.layout
            },
        }
    }

    pub fn viewport_size(&self) -> Vec2 {
        Vec2::new(self.viewport_width, self.viewport_height)
    }

    /// Layout centre: the middle of the viewport
    pub fn viewport_center(&self) -> Vec2 {
        self.viewport_size().scale(0.5)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: '{}'", key, raw);
            None
        }
    }
}
