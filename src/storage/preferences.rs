use std::fmt::Display;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::kv_storage::KeyValueStorage;

pub const THEME_KEY: &str = "timetracker-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

/// User preferences that share storage with the ledgers but aren't part of them.
pub struct PreferenceStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> PreferenceStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Unknown values fall back to the default theme.
    pub async fn theme(&self) -> Result<Theme> {
        Ok(self
            .storage
            .get(THEME_KEY)
            .await?
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.storage
            .set(THEME_KEY, serde_json::to_value(theme)?)
            .await
    }
}
