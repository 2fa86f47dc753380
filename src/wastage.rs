use crate::config::PlannerConfig;
use crate::error::WastageIssue;
use crate::types::ProductionCutRoll;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Leftover trim on one physical set, reported back as reusable stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WastageAllocation {
    pub width_inches: f64,
    pub paper_id: String,
    pub gsm: u32,
    pub bf: f64,
    pub shade: String,
    pub individual_roll_number: u32,
    pub source_plan_id: String,
    pub notes: String,
}

/// Inclusive range of trim widths worth reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportableRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ReportableRange {
    fn default() -> Self {
        Self { min: 9.0, max: 21.0 }
    }
}

impl ReportableRange {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            min: config.min_reportable_wastage,
            max: config.max_reportable_wastage,
        }
    }

    pub fn contains(&self, width: f64) -> bool {
        width >= self.min && width <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    roll_number: u32,
    gsm: u32,
    bf_bits: u64,
    shade: String,
}

/// Derives wastage records from the trim annotations of produced cut rolls.
pub struct WastageExtractor {
    range: ReportableRange,
}

impl WastageExtractor {
    pub fn new(range: ReportableRange) -> Self {
        Self { range }
    }

    /// One record per physical set with a reportable trim, in the order the
    /// sets first appear.
    pub fn extract(&self, cut_rolls: &[ProductionCutRoll], source_plan_id: &str) -> Vec<WastageAllocation> {
        let mut groups: IndexMap<GroupKey, Vec<&ProductionCutRoll>> = IndexMap::new();
        for cut in cut_rolls {
            let Some(roll_number) = cut.individual_roll_number else {
                continue;
            };
            let key = GroupKey {
                roll_number,
                gsm: cut.gsm,
                bf_bits: cut.bf.to_bits(),
                shade: cut.shade.clone(),
            };
            groups.entry(key).or_default().push(cut);
        }

        let mut records = Vec::new();
        for (key, members) in &groups {
            let first = members[0];
            let trim = match first.trim_left {
                Some(t) if t > 0.0 => t,
                _ => continue,
            };
            if !self.range.contains(trim) {
                tracing::debug!(
                    roll_number = key.roll_number,
                    trim,
                    "trim outside reportable range"
                );
                continue;
            }
            let paper_id = members
                .iter()
                .filter_map(|m| m.paper_id.as_deref())
                .find(|id| !id.is_empty())
                .unwrap_or_default()
                .to_string();
            records.push(WastageAllocation {
                width_inches: trim,
                paper_id,
                gsm: first.gsm,
                bf: first.bf,
                shade: first.shade.clone(),
                individual_roll_number: key.roll_number,
                source_plan_id: source_plan_id.to_string(),
                notes: format!(
                    "Trim from sub-roll #{} ({} cuts)",
                    key.roll_number,
                    members.len()
                ),
            });
        }
        tracing::info!(
            groups = groups.len(),
            records = records.len(),
            source_plan_id,
            "wastage extracted"
        );
        records
    }

    /// Collects every problem in `records`; an empty result means all valid.
    pub fn validate(&self, records: &[WastageAllocation]) -> Vec<WastageIssue> {
        let mut issues = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if !self.range.contains(record.width_inches) {
                issues.push(WastageIssue::OutOfRange {
                    index,
                    width: record.width_inches,
                    min: self.range.min,
                    max: self.range.max,
                });
            }
            if record.paper_id.trim().is_empty() {
                issues.push(WastageIssue::MissingField {
                    index,
                    field: "paper_id",
                });
            }
            if record.source_plan_id.trim().is_empty() {
                issues.push(WastageIssue::MissingField {
                    index,
                    field: "source_plan_id",
                });
            }
        }
        issues
    }
}

impl Default for WastageExtractor {
    fn default() -> Self {
        Self::new(ReportableRange::default())
    }
}
