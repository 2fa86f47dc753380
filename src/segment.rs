use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Widest run a physical print segment can hold, in inches.
pub const DEFAULT_MAX_WIDTH: f64 = 123.0;

/// One cut roll to lay out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentItem {
    pub code: String,
    pub width_inches: f64,
    #[serde(default)]
    pub client_name: Option<String>,
}

impl SegmentItem {
    pub fn new(code: impl Into<String>, width_inches: f64) -> Self {
        Self {
            code: code.into(),
            width_inches,
            client_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub items: Vec<SegmentItem>,
    pub used_width: f64,
    pub waste: f64,
    pub efficiency: f64,
    /// A single item wider than the substrate.
    pub oversized: bool,
}

impl Segment {
    fn close(items: Vec<SegmentItem>, max_width: f64) -> Self {
        let used_width: f64 = items.iter().map(|i| i.width_inches).sum();
        let oversized = items.len() == 1 && used_width > max_width;
        let waste = if oversized {
            0.0
        } else {
            (max_width - used_width).max(0.0)
        };
        Self {
            items,
            used_width,
            waste,
            efficiency: used_width / max_width,
            oversized,
        }
    }
}

/// Numeric sequence of an item code: its last run of digits, if it parses.
pub fn sequence_number(code: &str) -> Option<u64> {
    code.rsplit(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .and_then(|run| run.parse().ok())
}

fn layout_order(a: &SegmentItem, b: &SegmentItem) -> Ordering {
    match (sequence_number(&a.code), sequence_number(&b.code)) {
        // keep input order among unparsable codes
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(sa), Some(sb)) => sa
            .cmp(&sb)
            .then_with(|| a.width_inches.total_cmp(&b.width_inches))
            .then_with(|| a.code.cmp(&b.code)),
    }
}

/// Puts items in print order: code sequence, then width, then code.
pub fn sort_for_layout(items: &mut [SegmentItem]) {
    items.sort_by(layout_order);
}

/// Splits an ordered run of cut rolls into width-bounded print segments.
pub struct SegmentationEngine {
    max_allowed_width: f64,
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self {
            max_allowed_width: DEFAULT_MAX_WIDTH,
        }
    }
}

impl SegmentationEngine {
    pub fn new(max_allowed_width: f64) -> Result<Self> {
        if !(max_allowed_width.is_finite() && max_allowed_width > 0.0) {
            return Err(PlanError::InvalidMaxWidth(max_allowed_width));
        }
        Ok(Self { max_allowed_width })
    }

    pub fn max_allowed_width(&self) -> f64 {
        self.max_allowed_width
    }

    /// Greedy first fit in input order; items are never reordered or split.
    pub fn segment(&self, items: &[SegmentItem]) -> Vec<Segment> {
        let max = self.max_allowed_width;
        let mut segments = Vec::new();
        let mut current: Vec<SegmentItem> = Vec::new();
        let mut current_width = 0.0;

        for item in items {
            if item.width_inches > max {
                if !current.is_empty() {
                    segments.push(Segment::close(std::mem::take(&mut current), max));
                }
                segments.push(Segment::close(vec![item.clone()], max));
                current_width = 0.0;
            } else if current_width + item.width_inches > max {
                segments.push(Segment::close(std::mem::take(&mut current), max));
                current.push(item.clone());
                current_width = item.width_inches;
            } else {
                current.push(item.clone());
                current_width += item.width_inches;
            }
        }
        if !current.is_empty() {
            segments.push(Segment::close(current, max));
        }

        tracing::debug!(
            items = items.len(),
            segments = segments.len(),
            max_width = max,
            "cut sequence segmented"
        );
        segments
    }

    /// Sorts a copy of `items` into print order and segments it.
    pub fn layout(&self, items: &[SegmentItem]) -> Vec<Segment> {
        let mut ordered = items.to_vec();
        sort_for_layout(&mut ordered);
        self.segment(&ordered)
    }
}

/// Drawing size for an item, proportional to its share of the substrate.
///
/// Only for rendering; packing always uses real widths.
pub fn display_width(width: f64, max_allowed_width: f64, canvas: f64, min_size: f64) -> f64 {
    let proportional = width / max_allowed_width * canvas;
    proportional.clamp(min_size.min(canvas), canvas)
}

/// Text shown on one printed cut roll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemLabel {
    pub client: String,
    pub width: String,
    pub code: String,
}

pub fn item_label(item: &SegmentItem, client_chars: usize) -> ItemLabel {
    let name = item.client_name.as_deref().unwrap_or("");
    let client = if name.chars().count() > client_chars {
        let mut short: String = name.chars().take(client_chars.saturating_sub(1)).collect();
        short.push('…');
        short
    } else {
        name.to_string()
    };
    ItemLabel {
        client,
        width: format!("{}\"", item.width_inches),
        code: item.code.clone(),
    }
}
