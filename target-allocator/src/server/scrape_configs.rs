use std::collections::BTreeMap;

use axum::body::Bytes;
use parking_lot::RwLock;
use serde_json::Value;

/// Relabel actions whose `regex` field collectors refuse to parse.
const REGEX_FREE_ACTIONS: [&str; 2] = ["keepequal", "dropequal"];

const RELABEL_SECTIONS: [&str; 2] = ["relabel_configs", "metric_relabel_configs"];

/// The encoded `/scrape_configs` response, rebuilt on every discovery tick.
///
/// Empty until the first successful update, which is also what readiness
/// reports on.
#[derive(Default)]
pub struct ScrapeConfigStore {
    response: RwLock<Option<Bytes>>,
}

impl ScrapeConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the job to scrape config map and replaces the stored response.
    pub fn update(&self, configs: &BTreeMap<String, Value>) -> Result<(), serde_json::Error> {
        let mut configs = configs.clone();
        for config in configs.values_mut() {
            strip_equality_regex(config);
        }
        let encoded = Bytes::from(serde_json::to_vec(&configs)?);
        *self.response.write() = Some(encoded);
        Ok(())
    }

    pub fn get(&self) -> Option<Bytes> {
        self.response.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.response.read().is_some()
    }
}

/// Drops `regex` from keepequal/dropequal relabel rules of one scrape config.
pub fn strip_equality_regex(config: &mut Value) {
    for section in RELABEL_SECTIONS {
        let Some(Value::Array(rules)) = config.get_mut(section) else {
            continue;
        };
        for rule in rules.iter_mut().filter_map(Value::as_object_mut) {
            let drop_regex = rule
                .get("action")
                .and_then(Value::as_str)
                .is_some_and(|action| REGEX_FREE_ACTIONS.contains(&action));
            if drop_regex {
                rule.remove("regex");
            }
        }
    }
}
