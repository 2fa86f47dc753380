use crate::config::PlannerConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Prefix of jumbo ids that are already human readable.
pub const CANONICAL_JUMBO_PREFIX: &str = "JR_";
pub const UNGROUPED_LABEL: &str = "Ungrouped Items";
pub const STOCK_LABEL: &str = "Cut Rolls from Stock";

/// Recognisers for historical jumbo identifiers.
#[derive(Debug, Clone)]
pub struct LegacyPatterns {
    patterns: Vec<Regex>,
}

impl LegacyPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, raw: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(raw))
    }
}

/// Display labels assigned to one batch of jumbo ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct JumboLabels {
    labels: BTreeMap<String, String>,
}

impl JumboLabels {
    /// The label for `raw`; ids outside the batch pass through.
    pub fn label<'a>(&'a self, raw: &'a str) -> &'a str {
        self.labels.get(raw).map_or(raw, String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Maps opaque jumbo and set identifiers to stable, readable labels.
#[derive(Debug, Clone)]
pub struct SequentialIdMapper {
    legacy: LegacyPatterns,
    ungrouped_sentinel: String,
    stock_barcode_prefixes: Vec<String>,
}

impl SequentialIdMapper {
    pub fn new(
        legacy: LegacyPatterns,
        ungrouped_sentinel: impl Into<String>,
        stock_barcode_prefixes: Vec<String>,
    ) -> Self {
        Self {
            legacy,
            ungrouped_sentinel: ungrouped_sentinel.into(),
            stock_barcode_prefixes,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Result<Self, regex::Error> {
        Ok(Self::new(
            LegacyPatterns::new(&config.legacy_jumbo_patterns)?,
            config.ungrouped_sentinel.clone(),
            config.stock_barcode_prefixes.clone(),
        ))
    }

    pub fn is_ungrouped(&self, raw: &str) -> bool {
        raw == self.ungrouped_sentinel
    }

    /// Labels every raw jumbo id seen in one report or print run.
    ///
    /// Ranks come from the sorted distinct ids, so the result does not depend
    /// on input order or repetition. A rank label already held by an id that
    /// passes through is skipped, keeping labels unique within the batch.
    pub fn jumbo_labels<'a>(&self, raw_ids: impl IntoIterator<Item = &'a str>) -> JumboLabels {
        let distinct: BTreeSet<&str> = raw_ids
            .into_iter()
            .filter(|id| !self.is_ungrouped(id))
            .collect();

        let mut taken: BTreeSet<String> = distinct
            .iter()
            .filter(|raw| !self.is_legacy(raw))
            .map(|raw| raw.to_string())
            .collect();

        let mut labels = BTreeMap::new();
        for (rank, raw) in distinct.into_iter().enumerate() {
            let label = if self.is_legacy(raw) {
                let mut n = rank + 1;
                while taken.contains(&rank_label(n)) {
                    n += 1;
                }
                let label = rank_label(n);
                taken.insert(label.clone());
                label
            } else {
                raw.to_string()
            };
            labels.insert(raw.to_string(), label);
        }
        JumboLabels { labels }
    }

    fn is_legacy(&self, raw: &str) -> bool {
        !raw.starts_with(CANONICAL_JUMBO_PREFIX) && self.legacy.matches(raw)
    }

    /// Label for the ungrouped bucket, given the barcodes of its items.
    pub fn ungrouped_label<S: AsRef<str>>(&self, barcodes: &[S]) -> &'static str {
        let all_stock = !barcodes.is_empty()
            && barcodes.iter().all(|b| {
                self.stock_barcode_prefixes
                    .iter()
                    .any(|prefix| b.as_ref().starts_with(prefix.as_str()))
            });
        if all_stock { STOCK_LABEL } else { UNGROUPED_LABEL }
    }

    /// Label for one jumbo group, handling the ungrouped sentinel.
    pub fn group_label<'a, S: AsRef<str>>(
        &self,
        labels: &'a JumboLabels,
        raw: &'a str,
        barcodes: &[S],
    ) -> &'a str {
        if self.is_ungrouped(raw) {
            self.ungrouped_label(barcodes)
        } else {
            labels.label(raw)
        }
    }
}

fn rank_label(n: usize) -> String {
    format!("JR-{n:05}")
}

/// Label of the set at `position` (1-based) within its jumbo.
pub fn set_label(position: usize) -> String {
    format!("Set #{position}")
}
