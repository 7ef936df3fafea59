//! Data models for the ITR Engine.
//!
//! The `models` module defines the serialisable value types that flow
//! through the engine: the normalised taxpayer record, the per-regime
//! breakdown and the side-by-side comparison.  All of them derive
//! `Serialize` and `Deserialize` so that they can be exchanged with the
//! presentation layer as JSON.  They are plain values; the engine
//! builds a fresh set for every computation and never mutates them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Age assumed when the record does not state one.
pub const DEFAULT_AGE: u32 = 30;

fn default_age() -> u32 {
    DEFAULT_AGE
}

/// One taxpayer's annual financial facts for a single assessment year.
///
/// Amounts are non-negative rupee values.  Fractional values are
/// accepted; the engine only rounds the final tax figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxInputRecord {
    /// Total annual salary income.
    pub gross_salary: f64,
    /// Core pay component; the basis of the HRA exemption.
    pub basic_salary: f64,
    /// House rent allowance received from the employer.
    pub hra_component: f64,
    /// Dearness allowance, counted with basic pay for HRA purposes.
    pub da_component: f64,
    /// Annual rent paid by the taxpayer.
    pub rent_paid: f64,
    /// Whether the taxpayer lives in a metro city (50% vs 40% HRA basis).
    pub is_metro: bool,
    /// Savings-account interest.  Added to income and eligible for 80TTA.
    pub interest_income: f64,
    pub professional_tax: f64,
    /// 80C-eligible contributions such as provident fund.
    #[serde(rename = "basic80c")]
    pub basic_80c: f64,
    /// Life insurance premium, pooled with `basic_80c` under the 80C cap.
    pub lic_premium: f64,
    pub health_insurance: f64,
    pub education_loan_interest: f64,
    #[serde(alias = "lta")]
    pub leave_travel_assistance: f64,
    /// Additional NPS contribution under 80CCD(1B).
    pub nps_contribution: f64,
    /// Tax withheld as reported in Form 26AS.
    #[serde(rename = "tds_26as")]
    pub tds_26as: f64,
    /// Tax withheld as reported in Form 16.
    #[serde(rename = "tds_form16")]
    pub tds_form16: f64,
    #[serde(default = "default_age")]
    pub age: u32,
}

impl Default for TaxInputRecord {
    fn default() -> Self {
        Self {
            gross_salary: 0.0,
            basic_salary: 0.0,
            hra_component: 0.0,
            da_component: 0.0,
            rent_paid: 0.0,
            is_metro: false,
            interest_income: 0.0,
            professional_tax: 0.0,
            basic_80c: 0.0,
            lic_premium: 0.0,
            health_insurance: 0.0,
            education_loan_interest: 0.0,
            leave_travel_assistance: 0.0,
            nps_contribution: 0.0,
            tds_26as: 0.0,
            tds_form16: 0.0,
            age: DEFAULT_AGE,
        }
    }
}

impl TaxInputRecord {
    /// Salary plus other income, before any deduction.
    pub fn gross_total_income(&self) -> f64 {
        self.gross_salary + self.interest_income
    }

    /// Tax already withheld.  Form 26AS is authoritative; Form 16 is
    /// used only when 26AS reports nothing, which is the case for records
    /// built from an extracted Form 16 alone.
    pub fn tds_credit(&self) -> f64 {
        if self.tds_26as > 0.0 {
            self.tds_26as
        } else {
            self.tds_form16
        }
    }

    /// Form 16 and Form 26AS disagree on the tax withheld.
    pub fn tds_mismatch(&self) -> bool {
        self.tds_form16 != self.tds_26as
    }

    pub fn age_category(&self) -> AgeCategory {
        AgeCategory::from_age(self.age)
    }
}

/// The two statutory computation regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Itemised deductions, lower standard deduction, age-based exemption.
    Old,
    /// Flat standard deduction only, wider slabs.
    New,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Old => "old",
            Regime::New => "new",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "old" => Ok(Regime::Old),
            "new" => Ok(Regime::New),
            other => Err(format!("unknown regime '{other}'")),
        }
    }
}

/// Exemption tier under the Old Regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgeCategory {
    /// Below 60.
    Normal,
    /// 60 to 79.
    Senior,
    /// 80 and above.
    SuperSenior,
}

impl AgeCategory {
    pub fn from_age(age: u32) -> Self {
        match age {
            80.. => AgeCategory::SuperSenior,
            60..=79 => AgeCategory::Senior,
            _ => AgeCategory::Normal,
        }
    }
}

/// Itemised deductions applied under the Old Regime, after caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionBreakdown {
    pub standard_deduction: f64,
    pub hra_exemption: f64,
    pub professional_tax: f64,
    #[serde(rename = "section80c")]
    pub section_80c: f64,
    #[serde(rename = "section80tta")]
    pub section_80tta: f64,
    #[serde(rename = "section80ccd1b")]
    pub section_80ccd_1b: f64,
    pub lta: f64,
    pub health_insurance: f64,
    pub education_loan_interest: f64,
    /// Unused 80C headroom: the cap minus the capped 80C amount.  Not a
    /// deduction; excluded from [`DeductionBreakdown::total`].
    #[serde(rename = "section80cRemaining")]
    pub section_80c_remaining: f64,
}

impl DeductionBreakdown {
    pub fn total(&self) -> f64 {
        self.standard_deduction
            + self.hra_exemption
            + self.professional_tax
            + self.section_80c
            + self.section_80tta
            + self.section_80ccd_1b
            + self.lta
            + self.health_insurance
            + self.education_loan_interest
    }
}

/// Full tax breakdown for one regime.
///
/// Every field except `total_tax` keeps its fractional precision; the
/// presentation layer decides how to format them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeResult {
    pub regime: Regime,
    pub gross_total_income: f64,
    pub standard_deduction: f64,
    /// All deductions subtracted from gross total income.  Under the New
    /// Regime this equals the standard deduction.
    pub total_deductions: f64,
    /// Itemised deductions; present only for the Old Regime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deductions: Option<DeductionBreakdown>,
    /// Exemption tier the slabs were applied with; Old Regime only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_category: Option<AgeCategory>,
    pub taxable_income: f64,
    pub tax_before_rebate: f64,
    /// Section 87A rebate.
    pub rebate_amount: f64,
    pub tax_after_rebate: f64,
    pub cess_amount: f64,
    /// Final liability, rounded to whole rupees.
    pub total_tax: f64,
}

/// What the taxpayer owes or gets back once withheld tax is credited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "lowercase")]
pub enum Settlement {
    Payable(f64),
    Refund(f64),
    Nil,
}

/// Both regimes computed on the same record, plus the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub old: RegimeResult,
    pub new: RegimeResult,
    /// Old only when it is strictly cheaper; ties go to New.
    pub recommended_regime: Regime,
    /// Absolute difference between the two total tax figures.
    pub savings_amount: f64,
    /// The regime the settlement figures refer to.  Defaults to the
    /// recommended one.
    pub selected_regime: Regime,
    pub tds_credit: f64,
    /// Form 16 and Form 26AS report different withheld amounts.
    #[serde(default)]
    pub tds_mismatch: bool,
    /// `selected.total_tax - tds_credit`; negative means refund.
    pub final_payable_or_refund: f64,
    /// The figures came from a payslip and were annualised upstream.
    #[serde(default)]
    pub is_estimated: bool,
}

impl ComparisonResult {
    pub fn result_for(&self, regime: Regime) -> &RegimeResult {
        match regime {
            Regime::Old => &self.old,
            Regime::New => &self.new,
        }
    }

    pub fn selected(&self) -> &RegimeResult {
        self.result_for(self.selected_regime)
    }

    pub fn settlement(&self) -> Settlement {
        let balance = self.final_payable_or_refund;
        if balance > 0.0 {
            Settlement::Payable(balance)
        } else if balance < 0.0 {
            Settlement::Refund(-balance)
        } else {
            Settlement::Nil
        }
    }
}
