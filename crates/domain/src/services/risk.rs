//! Static risk-label lookup backed by a JSON table of known entities.
//!
//! The table maps entity names to addresses (`{"Some Exchange": "addr..."}`).
//! A missing or malformed file degrades to an empty table with a warning so
//! monitoring can proceed without risk classification.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::model::Address;

/// Label returned when an address matches no known entity.
pub const UNKNOWN_RISK_LABEL: &str = "Unknown";

#[derive(Debug, Default)]
pub struct RiskLookup {
    /// Entity name keyed table; values are the entities' addresses.
    entries: HashMap<String, String>,
}

impl RiskLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Loads the table from `path`, degrading to an empty table on failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let entries = fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|raw| {
                serde_json::from_str::<HashMap<String, String>>(&raw)
                    .map_err(|err| err.to_string())
            });

        match entries {
            Ok(entries) => Self { entries },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not load risk data");
                Self::default()
            }
        }
    }

    /// Human-readable risk label for `address`; `"Unknown"` when unmatched.
    pub fn lookup(&self, address: &Address) -> String {
        for (name, known) in &self.entries {
            if known == address.as_str() {
                return format!("High Risk: {name}");
            }
        }
        UNKNOWN_RISK_LABEL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_known_addresses() {
        let lookup = RiskLookup::from_entries(HashMap::from([(
            "Big Exchange".to_string(),
            "addr-exchange".to_string(),
        )]));
        assert_eq!(
            lookup.lookup(&Address::new("addr-exchange")),
            "High Risk: Big Exchange"
        );
    }

    #[test]
    fn defaults_to_unknown() {
        let lookup = RiskLookup::empty();
        assert_eq!(lookup.lookup(&Address::new("addr1")), UNKNOWN_RISK_LABEL);
    }

    #[test]
    fn missing_file_degrades_to_empty_table() {
        let lookup = RiskLookup::load("/nonexistent/risk_data.json");
        assert_eq!(lookup.lookup(&Address::new("addr1")), UNKNOWN_RISK_LABEL);
    }
}
