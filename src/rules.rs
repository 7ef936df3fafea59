//! Statutory parameters for each regime.
//!
//! A [`TaxRules`] value holds every constant the calculators need for
//! one assessment year: standard deductions, age exemption tiers, slab
//! bands, rebate limits, deduction caps, the HRA percentages and the
//! cess rate.  The FY 2024-25 figures are built in; further years can be
//! supplied as JSON files in a rules directory and are validated before
//! use so that a malformed file can never break the slab tax invariants.

use crate::error::RulesError;
use crate::models::AgeCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Assessment year of the built-in rule set.
pub const DEFAULT_ASSESSMENT_YEAR: &str = "2025-26";

static DEFAULT_RULES: LazyLock<TaxRules> = LazyLock::new(TaxRules::fy2024_25);

/// A marginal band.  The band starts where the previous one ends (the
/// first one starts at the age exemption limit) and runs up to `upto`,
/// or without bound when `upto` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slab {
    pub upto: Option<f64>,
    pub rate: f64,
}

impl Slab {
    pub const fn bounded(upto: f64, rate: f64) -> Self {
        Self {
            upto: Some(upto),
            rate,
        }
    }

    pub const fn open(rate: f64) -> Self {
        Self { upto: None, rate }
    }
}

/// Income below which no tax is charged, per age tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeExemptions {
    pub normal: f64,
    pub senior: f64,
    pub super_senior: f64,
}

impl AgeExemptions {
    /// Same limit for every tier.
    pub const fn flat(limit: f64) -> Self {
        Self {
            normal: limit,
            senior: limit,
            super_senior: limit,
        }
    }

    pub fn limit_for(&self, age: u32) -> f64 {
        match AgeCategory::from_age(age) {
            AgeCategory::Normal => self.normal,
            AgeCategory::Senior => self.senior,
            AgeCategory::SuperSenior => self.super_senior,
        }
    }
}

/// Section 87A rebate: up to `max_rebate` when taxable income is at or
/// below `income_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebateRule {
    pub income_limit: f64,
    pub max_rebate: f64,
}

impl RebateRule {
    pub fn rebate(&self, taxable_income: f64, tax_before_rebate: f64) -> f64 {
        if taxable_income <= self.income_limit {
            self.max_rebate.min(tax_before_rebate)
        } else {
            0.0
        }
    }
}

/// Parameters shared by both regimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeRules {
    pub standard_deduction: f64,
    pub exemption: AgeExemptions,
    pub slabs: Vec<Slab>,
    pub rebate: RebateRule,
}

/// Caps on Old Regime deductions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionCaps {
    pub professional_tax: f64,
    #[serde(rename = "section80c")]
    pub section_80c: f64,
    #[serde(rename = "section80tta")]
    pub section_80tta: f64,
    #[serde(rename = "section80ccd1b")]
    pub section_80ccd_1b: f64,
    /// When set, taxpayers at or above this age get no 80TTA deduction
    /// (they claim 80TTB instead).  Unset by default.
    #[serde(default, rename = "section80ttaAgeLimit")]
    pub section_80tta_age_limit: Option<u32>,
}

/// HRA exemption percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HraRules {
    /// Share of basic + DA allowed in a metro city.
    pub metro_rate: f64,
    pub non_metro_rate: f64,
    /// Share of basic + DA that rent must exceed before it counts.
    pub rent_excess_rate: f64,
}

/// The complete rule set for one assessment year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRules {
    /// e.g. `"2025-26"`.
    pub assessment_year: String,
    pub cess_rate: f64,
    pub old: RegimeRules,
    pub new: RegimeRules,
    pub caps: DeductionCaps,
    pub hra: HraRules,
}

impl TaxRules {
    /// FY 2024-25 (AY 2025-26).
    pub fn fy2024_25() -> Self {
        Self {
            assessment_year: DEFAULT_ASSESSMENT_YEAR.to_string(),
            cess_rate: 0.04,
            old: RegimeRules {
                standard_deduction: 50_000.0,
                exemption: AgeExemptions {
                    normal: 250_000.0,
                    senior: 300_000.0,
                    super_senior: 500_000.0,
                },
                slabs: vec![
                    Slab::bounded(500_000.0, 0.05),
                    Slab::bounded(1_000_000.0, 0.20),
                    Slab::open(0.30),
                ],
                rebate: RebateRule {
                    income_limit: 500_000.0,
                    max_rebate: 12_500.0,
                },
            },
            new: RegimeRules {
                standard_deduction: 75_000.0,
                exemption: AgeExemptions::flat(300_000.0),
                slabs: vec![
                    Slab::bounded(600_000.0, 0.05),
                    Slab::bounded(900_000.0, 0.10),
                    Slab::bounded(1_200_000.0, 0.15),
                    Slab::bounded(1_500_000.0, 0.20),
                    Slab::open(0.30),
                ],
                rebate: RebateRule {
                    income_limit: 700_000.0,
                    max_rebate: 25_000.0,
                },
            },
            caps: DeductionCaps {
                professional_tax: 2_500.0,
                section_80c: 150_000.0,
                section_80tta: 10_000.0,
                section_80ccd_1b: 50_000.0,
                section_80tta_age_limit: None,
            },
            hra: HraRules {
                metro_rate: 0.50,
                non_metro_rate: 0.40,
                rent_excess_rate: 0.10,
            },
        }
    }

    /// Shared instance of the built-in rule set.
    pub fn builtin() -> &'static TaxRules {
        &DEFAULT_RULES
    }

    /// Check that the rule set is internally consistent.
    pub fn validate(&self) -> Result<(), RulesError> {
        check_rate("cess rate", self.cess_rate)?;
        validate_regime("old", &self.old)?;
        validate_regime("new", &self.new)?;
        let caps = [
            ("professional tax cap", self.caps.professional_tax),
            ("80C cap", self.caps.section_80c),
            ("80TTA cap", self.caps.section_80tta),
            ("80CCD(1B) cap", self.caps.section_80ccd_1b),
        ];
        for (name, value) in caps {
            check_amount(name, value)?;
        }
        check_rate("HRA metro rate", self.hra.metro_rate)?;
        check_rate("HRA non-metro rate", self.hra.non_metro_rate)?;
        check_rate("HRA rent excess rate", self.hra.rent_excess_rate)?;
        Ok(())
    }
}

impl Default for TaxRules {
    fn default() -> Self {
        Self::fy2024_25()
    }
}

fn check_rate(name: &str, rate: f64) -> Result<(), RulesError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(RulesError::InvalidParameter(format!(
            "{name} {rate} is outside [0, 1]"
        )))
    }
}

fn check_amount(name: &str, amount: f64) -> Result<(), RulesError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(RulesError::InvalidParameter(format!(
            "{name} {amount} must be a non-negative amount"
        )))
    }
}

fn validate_regime(regime: &'static str, rules: &RegimeRules) -> Result<(), RulesError> {
    let invalid = |message: String| RulesError::Invalid { regime, message };

    for (name, value) in [
        ("standard deduction", rules.standard_deduction),
        ("normal exemption", rules.exemption.normal),
        ("senior exemption", rules.exemption.senior),
        ("super senior exemption", rules.exemption.super_senior),
        ("rebate income limit", rules.rebate.income_limit),
        ("maximum rebate", rules.rebate.max_rebate),
    ] {
        check_amount(name, value).map_err(|e| invalid(e.to_string()))?;
    }

    let Some((last, bounded)) = rules.slabs.split_last() else {
        return Err(invalid("at least one slab is required".into()));
    };
    if last.upto.is_some() {
        return Err(invalid("the last slab must be open-ended".into()));
    }
    let mut previous = 0.0_f64;
    for slab in bounded {
        let Some(upto) = slab.upto else {
            return Err(invalid("only the last slab may be open-ended".into()));
        };
        if !upto.is_finite() || upto < previous {
            return Err(invalid(format!(
                "slab bound {upto} is below the previous bound {previous}"
            )));
        }
        previous = upto;
    }
    for slab in &rules.slabs {
        check_rate("slab rate", slab.rate).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}

/// Load every `.json` rule set in `path`.
///
/// Files that fail to parse or validate are logged and skipped.  A
/// missing directory yields an empty list.
pub fn load_rule_sets_from_dir(path: &Path) -> Result<Vec<TaxRules>, RulesError> {
    let mut rule_sets = Vec::new();
    if !path.is_dir() {
        debug!(dir = %path.display(), "rules directory not found");
        return Ok(rule_sets);
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file)?;
        let parsed = serde_json::from_str::<TaxRules>(&data)
            .map_err(RulesError::from)
            .and_then(|rules| rules.validate().map(|()| rules));
        match parsed {
            Ok(rules) => {
                debug!(file = %file.display(), year = %rules.assessment_year, "loaded rule set");
                rule_sets.push(rules);
            }
            Err(err) => warn!(file = %file.display(), error = %err, "skipping rule set"),
        }
    }
    Ok(rule_sets)
}

/// Rule sets keyed by assessment year.  Always contains the built-in
/// set unless a loaded file replaces it.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rule_sets: HashMap<String, TaxRules>,
    default_year: String,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let builtin = TaxRules::fy2024_25();
        let default_year = builtin.assessment_year.clone();
        let mut rule_sets = HashMap::new();
        rule_sets.insert(default_year.clone(), builtin);
        Self {
            rule_sets,
            default_year,
        }
    }
}

impl RuleRegistry {
    /// Built-in rule set plus every valid file in `dir`.
    pub fn load(dir: &Path) -> Result<Self, RulesError> {
        let mut registry = Self::default();
        for rules in load_rule_sets_from_dir(dir)? {
            registry.insert(rules);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, rules: TaxRules) {
        self.rule_sets.insert(rules.assessment_year.clone(), rules);
    }

    /// Rule set for `year`, or the default year when `None`.
    pub fn get(&self, year: Option<&str>) -> Option<&TaxRules> {
        self.rule_sets.get(year.unwrap_or(&self.default_year))
    }

    pub fn default_year(&self) -> &str {
        &self.default_year
    }

    /// Registered assessment years, sorted.
    pub fn years(&self) -> Vec<String> {
        let mut years: Vec<String> = self.rule_sets.keys().cloned().collect();
        years.sort();
        years
    }
}
