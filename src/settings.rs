use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::CurrencySelection;

const DATA_FILE: &str = ".coinwatch-data.json";

/// Persisted user state: favourites, currency id and holdings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub favourites: BTreeSet<String>,
    pub currency: String,
    pub portfolio: BTreeMap<String, f64>,
}

// On-disk layout. Favourites are stored as a map of id to `true`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    favourites: BTreeMap<String, bool>,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    portfolio: BTreeMap<String, f64>,
}

impl From<Document> for Settings {
    fn from(doc: Document) -> Self {
        Settings {
            favourites: doc
                .favourites
                .into_iter()
                .filter_map(|(id, starred)| starred.then_some(id))
                .collect(),
            currency: doc.currency,
            portfolio: doc
                .portfolio
                .into_iter()
                .filter(|(_, qty)| qty.is_finite() && *qty > 0.0)
                .collect(),
        }
    }
}

impl From<&Settings> for Document {
    fn from(s: &Settings) -> Self {
        Document {
            favourites: s.favourites.iter().map(|id| (id.clone(), true)).collect(),
            currency: s.currency.clone(),
            portfolio: s.portfolio.clone(),
        }
    }
}

/// Reads and writes [`Settings`] as a single JSON document.
///
/// The final file is hidden; writes go to a visible sibling first and are
/// renamed into place so a crash never leaves a half-written document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.coinwatch-data.json`, or the current directory without a home.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or malformed documents load as defaults.
    pub fn load(&self) -> Settings {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Settings::default(),
        };
        match serde_json::from_str::<Document>(&contents) {
            Ok(doc) => doc.into(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed settings");
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&Document::from(settings))?;
        let tmp = self.staging_path();
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move settings into {}", self.path.display()))?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().trim_start_matches('.').to_string())
            .unwrap_or_else(|| "coinwatch-data.json".to_string());
        self.path.with_file_name(format!("{}.tmp", name))
    }
}

/// Favourites, holdings and currency owned by the active view.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub favourites: BTreeSet<String>,
    pub portfolio: BTreeMap<String, f64>,
    pub currency: CurrencySelection,
}

/// Outcome of a numeric-entry on a holding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldingChange {
    Set(f64),
    Removed,
}

impl Profile {
    pub fn new(settings: Settings, currency: CurrencySelection) -> Self {
        Self {
            favourites: settings.favourites,
            portfolio: settings.portfolio,
            currency,
        }
    }

    pub fn to_settings(&self) -> Settings {
        Settings {
            favourites: self.favourites.clone(),
            currency: self.currency.id.clone(),
            portfolio: self.portfolio.clone(),
        }
    }

    pub fn star(&mut self, id: &str) -> bool {
        self.favourites.insert(id.to_string())
    }

    pub fn unstar(&mut self, id: &str) -> bool {
        self.favourites.remove(id)
    }

    pub fn holding(&self, id: &str) -> Option<f64> {
        self.portfolio.get(id).copied()
    }

    /// Apply typed input to a holding. Anything but a finite amount above
    /// zero removes the coin from the portfolio.
    pub fn apply_amount(&mut self, id: &str, input: &str) -> HoldingChange {
        match input.trim().parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount > 0.0 => {
                self.portfolio.insert(id.to_string(), amount);
                HoldingChange::Set(amount)
            }
            _ => {
                self.portfolio.remove(id);
                HoldingChange::Removed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Settings {
        Settings {
            favourites: ["bitcoin".to_string(), "solana".to_string()].into(),
            currency: "euro".to_string(),
            portfolio: [("bitcoin".to_string(), 0.25)].into(),
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join(".coinwatch-data.json"));
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
        assert!(!dir.path().join("coinwatch-data.json.tmp").exists());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join(".absent.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn malformed_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".coinwatch-data.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(&path).load(), Settings::default());
    }

    #[test]
    fn legacy_layout_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".coinwatch-data.json");
        fs::write(
            &path,
            r#"{"favourites":{"bitcoin":true,"dogecoin":false},"portfolio":{"ethereum":0,"bitcoin":1.5}}"#,
        )
        .unwrap();
        let s = SettingsStore::new(&path).load();
        assert_eq!(s.favourites, ["bitcoin".to_string()].into());
        assert_eq!(s.portfolio, [("bitcoin".to_string(), 1.5)].into());
        assert_eq!(s.currency, "");
    }

    #[test]
    fn amount_entry() {
        let mut p = Profile::default();
        assert_eq!(p.apply_amount("bitcoin", "2.5"), HoldingChange::Set(2.5));
        assert_eq!(p.holding("bitcoin"), Some(2.5));
        assert_eq!(p.apply_amount("bitcoin", " 3 "), HoldingChange::Set(3.0));
        assert_eq!(p.holding("bitcoin"), Some(3.0));

        assert_eq!(p.apply_amount("bitcoin", "0"), HoldingChange::Removed);
        assert_eq!(p.holding("bitcoin"), None);

        p.apply_amount("ethereum", "1");
        assert_eq!(p.apply_amount("ethereum", "lots"), HoldingChange::Removed);
        assert!(p.portfolio.is_empty());

        assert_eq!(p.apply_amount("dogecoin", "-4"), HoldingChange::Removed);
        assert_eq!(p.apply_amount("dogecoin", "NaN"), HoldingChange::Removed);
        assert!(p.portfolio.is_empty());
    }

    #[test]
    fn profile_round_trips_currency_id() {
        let p = Profile::new(sample(), CurrencySelection::default());
        let s = p.to_settings();
        assert_eq!(s.currency, "united-states-dollar");
        assert_eq!(s.favourites, sample().favourites);
    }
}
