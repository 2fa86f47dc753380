use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for one planning deployment.
///
/// Values come from [`PlannerConfig::default`], optionally overlaid by a JSON
/// file and then by `ROLL_PLANNER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Raw width of one set before the wastage allowance is taken off.
    pub base_width: f64,
    /// Planning width never drops below this, whatever the allowance.
    pub floor_width: f64,
    /// Allowance committed when a session starts.
    pub default_allowance: f64,
    /// Widest run of cut rolls one printed segment may show.
    pub max_segment_width: f64,
    pub min_reportable_wastage: f64,
    pub max_reportable_wastage: f64,
    /// Raw jumbo id used for cut rolls that belong to no jumbo.
    pub ungrouped_sentinel: String,
    /// Barcode prefixes of cut rolls cut from wastage stock.
    pub stock_barcode_prefixes: Vec<String>,
    /// Regexes recognising historical jumbo ids that get rank labels.
    pub legacy_jumbo_patterns: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_width: 124.0,
            floor_width: 100.0,
            default_allowance: 1.0,
            max_segment_width: 123.0,
            min_reportable_wastage: 9.0,
            max_reportable_wastage: 21.0,
            ungrouped_sentinel: "ungrouped".to_string(),
            stock_barcode_prefixes: vec!["SCR-".to_string()],
            legacy_jumbo_patterns: vec![
                "^JMB-".to_string(),
                "^TMP-".to_string(),
                "^[0-9A-F]{8}$".to_string(),
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("floor width {floor} must be positive and not above base width {base}")]
    Widths { base: f64, floor: f64 },
    #[error("invalid {field}: {value}")]
    Value { field: &'static str, value: f64 },
}

impl PlannerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the optional file named by `ROLL_PLANNER_CONFIG` (or `path`), then
    /// applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var("ROLL_PLANNER_CONFIG").ok();
        let path = path.map(Path::to_path_buf).or(from_env.map(Into::into));
        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let numeric: [(&'static str, &mut f64); 4] = [
            ("ROLL_PLANNER_BASE_WIDTH", &mut self.base_width),
            ("ROLL_PLANNER_FLOOR_WIDTH", &mut self.floor_width),
            ("ROLL_PLANNER_ALLOWANCE", &mut self.default_allowance),
            ("ROLL_PLANNER_MAX_SEGMENT_WIDTH", &mut self.max_segment_width),
        ];
        for (var, slot) in numeric {
            if let Some(value) = lookup(var) {
                let parsed = value.trim().parse::<f64>();
                *slot = parsed.map_err(|_| ConfigError::Env { var, value })?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("base_width", self.base_width),
            ("floor_width", self.floor_width),
            ("default_allowance", self.default_allowance),
            ("min_reportable_wastage", self.min_reportable_wastage),
            ("max_reportable_wastage", self.max_reportable_wastage),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::Value { field, value });
            }
        }
        if !(self.max_segment_width.is_finite() && self.max_segment_width > 0.0) {
            return Err(ConfigError::Value {
                field: "max_segment_width",
                value: self.max_segment_width,
            });
        }
        if self.min_reportable_wastage > self.max_reportable_wastage {
            return Err(ConfigError::Value {
                field: "min_reportable_wastage",
                value: self.min_reportable_wastage,
            });
        }
        if !(self.floor_width > 0.0 && self.floor_width <= self.base_width) {
            return Err(ConfigError::Widths {
                base: self.base_width,
                floor: self.floor_width,
            });
        }
        Ok(())
    }
}
