//! Static rule tables: depreciation rates, required documents and business
//! rules. Each loads from a JSON file and falls back to built-in defaults for
//! anything the file leaves out.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ClaimsError, Result};

pub const REPAIR_COSTS_FILE: &str = "repair_costs.json";
pub const DOCUMENT_RULES_FILE: &str = "document_rules.json";
pub const BUSINESS_RULES_FILE: &str = "business_rules.json";

pub const DEFAULT_AUTO_APPROVAL_LIMIT: f64 = 50_000.0;
pub const DEFAULT_HOME_DEPRECIATION_RATE: f64 = 10.0;

/// Motor depreciation bands: (table key, upper bound in years, default rate)
pub const MOTOR_BANDS: [(&str, f64, f64); 7] = [
    ("0-6_months", 0.5, 0.0),
    ("6-12_months", 1.0, 5.0),
    ("1-2_years", 2.0, 10.0),
    ("2-3_years", 3.0, 15.0),
    ("3-4_years", 4.0, 25.0),
    ("4-5_years", 5.0, 35.0),
    ("5+_years", f64::INFINITY, 50.0),
];

/// Percentages keyed by band, from `depreciation_rates` in repair_costs.json
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DepreciationTable {
    #[serde(default)]
    motor: HashMap<String, f64>,
    #[serde(default)]
    home: HashMap<String, f64>,
}

#[derive(Deserialize)]
struct RepairCostsFile {
    #[serde(default)]
    depreciation_rates: DepreciationTable,
}

impl DepreciationTable {
    pub fn new(motor: HashMap<String, f64>, home: HashMap<String, f64>) -> Self {
        Self { motor, home }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: RepairCostsFile = serde_json::from_str(text)?;
        Ok(file.depreciation_rates)
    }

    /// Band key and default rate for a vehicle age. Ages that fit no band
    /// (including NaN) fall into the oldest one.
    pub fn motor_band(vehicle_age_years: f64) -> (&'static str, f64) {
        let (key, _, default) = MOTOR_BANDS
            .iter()
            .find(|(_, upper, _)| vehicle_age_years <= *upper)
            .copied()
            .unwrap_or(MOTOR_BANDS[MOTOR_BANDS.len() - 1]);
        (key, default)
    }

    pub fn motor_rate(&self, vehicle_age_years: f64) -> f64 {
        let (key, default) = Self::motor_band(vehicle_age_years);
        self.motor.get(key).copied().unwrap_or(default)
    }

    pub fn home_rate(&self) -> f64 {
        self.home
            .get("general")
            .copied()
            .unwrap_or(DEFAULT_HOME_DEPRECIATION_RATE)
    }
}

/// Documents for one claim type, critical first
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentRequirement {
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub standard: Vec<String>,
}

/// Required documents keyed by canonical claim type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRules {
    rules: HashMap<String, DocumentRequirement>,
}

impl DocumentRules {
    pub fn new(rules: HashMap<String, DocumentRequirement>) -> Self {
        Self { rules }
    }

    /// Top-level entries that are not requirement objects are skipped.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, Value> = serde_json::from_str(text)?;
        let rules = raw
            .into_iter()
            .filter_map(|(claim_type, value)| {
                serde_json::from_value::<DocumentRequirement>(value)
                    .ok()
                    .map(|req| (claim_type, req))
            })
            .collect();
        Ok(Self { rules })
    }

    pub fn get(&self, claim_type: &str) -> Option<&DocumentRequirement> {
        self.rules.get(claim_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRules {
    pub auto_approval_limit: f64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            auto_approval_limit: DEFAULT_AUTO_APPROVAL_LIMIT,
        }
    }
}

impl BusinessRules {
    /// Reads `auto_approval.conditions.max_amount`
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        let limit = raw
            .pointer("/auto_approval/conditions/max_amount")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_AUTO_APPROVAL_LIMIT);
        Ok(Self {
            auto_approval_limit: limit,
        })
    }
}

/// All rule tables used by one orchestrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTables {
    pub depreciation: DepreciationTable,
    pub documents: DocumentRules,
    pub business: BusinessRules,
}

impl RuleTables {
    /// Loads whichever table files exist in `dir`. Missing or unreadable
    /// files keep the built-in defaults.
    pub fn load(dir: &Path) -> Self {
        Self {
            depreciation: load_or_default(dir, REPAIR_COSTS_FILE, DepreciationTable::from_json),
            documents: load_or_default(dir, DOCUMENT_RULES_FILE, DocumentRules::from_json),
            business: load_or_default(dir, BUSINESS_RULES_FILE, BusinessRules::from_json),
        }
    }
}

/// Reads a whole JSON file, tagging errors with the path
pub fn read_table(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ClaimsError::TableLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn load_or_default<T, F>(dir: &Path, file_name: &str, parse: F) -> T
where
    T: Default,
    F: Fn(&str) -> Result<T>,
{
    let path = dir.join(file_name);
    if !path.exists() {
        info!(path = %path.display(), "Table file not found, using defaults");
        return T::default();
    }
    match read_table(&path).and_then(|text| parse(&text)) {
        Ok(table) => {
            info!(path = %path.display(), "Loaded table");
            table
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load table, using defaults");
            T::default()
        }
    }
}
