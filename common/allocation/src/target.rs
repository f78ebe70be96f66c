use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::hash::stable_hash;

pub const NODE_NAME_LABELS: [&str; 3] = [
    "__meta_kubernetes_pod_node_name",
    "__meta_kubernetes_node_name",
    "__meta_kubernetes_endpoint_node_name",
];

pub const ENDPOINT_SLICE_NAME_LABEL: &str = "__meta_kubernetes_endpointslice_name";

/// The label set of a scrape target.
///
/// Ordered by label name, names unique. Serializes as a plain JSON object,
/// the same shape Prometheus uses for target group labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a label, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One scrape endpoint, as produced by discovery.
///
/// Immutable once built: the content hash is computed at construction and
/// keys the target everywhere else. The collector hint records which
/// collector discovery thought should scrape the target; placement ignores
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetItem {
    job_name: String,
    target_url: String,
    labels: Labels,
    collector_hint: String,
    hash: u64,
}

impl TargetItem {
    pub fn new(
        job_name: impl Into<String>,
        target_url: impl Into<String>,
        labels: Labels,
        collector_hint: impl Into<String>,
    ) -> Self {
        let job_name = job_name.into();
        let target_url = target_url.into();

        let mut parts: Vec<&[u8]> = Vec::with_capacity(2 + labels.len() * 2);
        parts.push(job_name.as_bytes());
        parts.push(target_url.as_bytes());
        for (name, value) in &labels {
            parts.push(name.as_bytes());
            parts.push(value.as_bytes());
        }
        let hash = stable_hash(parts);

        Self {
            job_name,
            target_url,
            labels,
            collector_hint: collector_hint.into(),
            hash,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn collector_hint(&self) -> &str {
        &self.collector_hint
    }

    /// The stable identity of this target, 16 lower-case hex digits.
    ///
    /// Two items with the same job, URL and labels share a hash even when
    /// built independently. The HTTP layer uses it as a path identifier.
    pub fn hash(&self) -> String {
        format!("{:016x}", self.hash)
    }

    /// The numeric form of [`TargetItem::hash`], used as the position on
    /// the consistent hash ring.
    pub fn ring_position(&self) -> u64 {
        self.hash
    }

    /// The first non-empty value among [`NODE_NAME_LABELS`].
    pub fn node_name(&self) -> Option<&str> {
        NODE_NAME_LABELS
            .iter()
            .find_map(|label| self.labels.get(label).filter(|name| !name.is_empty()))
    }

    pub fn endpoint_slice_name(&self) -> Option<&str> {
        self.labels
            .get(ENDPOINT_SLICE_NAME_LABEL)
            .filter(|name| !name.is_empty())
    }
}

/// Keys targets by their content hash, collapsing duplicates reported by
/// more than one discovery source.
pub fn items_by_hash(items: impl IntoIterator<Item = TargetItem>) -> HashMap<String, TargetItem> {
    items.into_iter().map(|item| (item.hash(), item)).collect()
}
