use serde::{Deserialize, Serialize};

/// Width in whole hundredths of an inch, the resolution budgets are checked at.
pub fn hundredths(width_inches: f64) -> i64 {
    (width_inches * 100.0).round() as i64
}

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

arena_id!(SpecId, "spec");
arena_id!(JumboId, "jumbo");
arena_id!(SetId, "set");
arena_id!(CutRollId, "cut");

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client master record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub company_name: String,
}

/// Paper master record: the identity of one allocation subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSpec {
    #[serde(default)]
    pub paper_id: Option<String>,
    pub gsm: u32,
    pub bf: f64,
    pub shade: String,
}

impl PaperSpec {
    pub fn new(gsm: u32, bf: f64, shade: impl Into<String>) -> Self {
        Self {
            paper_id: None,
            gsm,
            bf,
            shade: shade.into(),
        }
    }

    pub fn same_paper(&self, other: &PaperSpec) -> bool {
        self.gsm == other.gsm && self.bf == other.bf && self.shade == other.shade
    }
}

impl std::fmt::Display for PaperSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}gsm/{}bf/{}", self.gsm, self.bf, self.shade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JumboRoll {
    pub id: JumboId,
    pub spec_id: SpecId,
    pub jumbo_number: u32,
}

/// A fixed-width sub-roll of a jumbo roll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollSet {
    pub id: SetId,
    pub jumbo_id: JumboId,
    pub set_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutRoll {
    pub id: CutRollId,
    pub set_id: SetId,
    pub width_inches: f64,
    pub quantity: u32,
    pub client_id: ClientId,
}

impl CutRoll {
    pub fn committed_width(&self) -> f64 {
        self.width_inches * f64::from(self.quantity)
    }
}

/// One cut roll as echoed back by the plan-creation service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionCutRoll {
    #[serde(default)]
    pub barcode: String,
    pub width_inches: f64,
    #[serde(default)]
    pub paper_id: Option<String>,
    pub gsm: u32,
    pub bf: f64,
    pub shade: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub individual_roll_number: Option<u32>,
    #[serde(default)]
    pub trim_left: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionSet {
    pub set_barcode: String,
    #[serde(default)]
    pub cut_rolls: Vec<ProductionCutRoll>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionJumbo {
    pub jumbo_barcode: String,
    #[serde(default)]
    pub sets: Vec<ProductionSet>,
}

/// Response of the plan-creation service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreatedPlan {
    pub plan_id: String,
    #[serde(default)]
    pub jumbo_rolls: Vec<ProductionJumbo>,
}

impl CreatedPlan {
    pub fn cut_rolls(&self) -> impl Iterator<Item = &ProductionCutRoll> {
        self.jumbo_rolls
            .iter()
            .flat_map(|j| &j.sets)
            .flat_map(|s| &s.cut_rolls)
    }
}
