//! Regime calculators.
//!
//! The `tax` module holds the arithmetic core: the HRA exemption, the
//! progressive slab function and one [`RegimeCalculator`] per regime.
//! Every function here is pure.  Intermediate amounts keep their full
//! precision and only the final `total_tax` is rounded to whole rupees.

use crate::models::{DeductionBreakdown, Regime, RegimeResult, TaxInputRecord};
use crate::rules::{HraRules, RegimeRules, TaxRules};

/// Computes one regime's breakdown for a taxpayer record.
///
/// Calculators must be thread-safe (`Send + Sync`) because the engine
/// may invoke them concurrently across multiple threads.
pub trait RegimeCalculator: Send + Sync {
    /// The regime this calculator implements.
    fn regime(&self) -> Regime;
    /// Computes the full breakdown for `record` under `rules`.  The
    /// record is only read; it is never modified.
    fn calculate(&self, record: &TaxInputRecord, rules: &TaxRules) -> RegimeResult;
}

/// Itemised deductions, age-tiered exemption.
pub struct OldRegimeCalculator;

/// Flat standard deduction only.
pub struct NewRegimeCalculator;

impl RegimeCalculator for OldRegimeCalculator {
    fn regime(&self) -> Regime {
        Regime::Old
    }

    fn calculate(&self, record: &TaxInputRecord, rules: &TaxRules) -> RegimeResult {
        let caps = &rules.caps;
        let regime_rules = &rules.old;

        let hra_exemption = hra_exemption(
            &rules.hra,
            record.rent_paid,
            record.hra_component,
            record.basic_salary,
            record.da_component,
            record.is_metro,
        );
        let section_80tta = match caps.section_80tta_age_limit {
            Some(limit) if record.age >= limit => 0.0,
            _ => record.interest_income.min(caps.section_80tta),
        };
        let section_80c = (record.basic_80c + record.lic_premium).min(caps.section_80c);
        let deductions = DeductionBreakdown {
            standard_deduction: regime_rules.standard_deduction,
            hra_exemption,
            professional_tax: record.professional_tax.min(caps.professional_tax),
            section_80c,
            section_80c_remaining: (caps.section_80c - section_80c).max(0.0),
            section_80tta,
            section_80ccd_1b: record.nps_contribution.min(caps.section_80ccd_1b),
            lta: record.leave_travel_assistance,
            health_insurance: record.health_insurance,
            education_loan_interest: record.education_loan_interest,
        };
        let total_deductions = deductions.total();

        RegimeResult {
            age_category: Some(record.age_category()),
            ..settle(
                Regime::Old,
                record,
                regime_rules,
                rules.cess_rate,
                total_deductions,
                Some(deductions),
            )
        }
    }
}

impl RegimeCalculator for NewRegimeCalculator {
    fn regime(&self) -> Regime {
        Regime::New
    }

    fn calculate(&self, record: &TaxInputRecord, rules: &TaxRules) -> RegimeResult {
        let regime_rules = &rules.new;
        settle(
            Regime::New,
            record,
            regime_rules,
            rules.cess_rate,
            regime_rules.standard_deduction,
            None,
        )
    }
}

/// Shared tail of both regimes: taxable income, slab tax, rebate, cess.
fn settle(
    regime: Regime,
    record: &TaxInputRecord,
    regime_rules: &RegimeRules,
    cess_rate: f64,
    total_deductions: f64,
    deductions: Option<DeductionBreakdown>,
) -> RegimeResult {
    let gross_total_income = record.gross_total_income();
    let taxable_income = (gross_total_income - total_deductions).max(0.0);
    let tax_before_rebate = slab_tax_with(regime_rules, taxable_income, record.age);
    let rebate_amount = regime_rules.rebate.rebate(taxable_income, tax_before_rebate);
    let tax_after_rebate = (tax_before_rebate - rebate_amount).max(0.0);
    let cess_amount = tax_after_rebate * cess_rate;

    RegimeResult {
        regime,
        gross_total_income,
        standard_deduction: regime_rules.standard_deduction,
        total_deductions,
        deductions,
        age_category: None,
        taxable_income,
        tax_before_rebate,
        rebate_amount,
        tax_after_rebate,
        cess_amount,
        total_tax: (tax_after_rebate + cess_amount).round(),
    }
}

/// The calculator for `regime`.
pub fn calculator_for(regime: Regime) -> &'static dyn RegimeCalculator {
    match regime {
        Regime::Old => &OldRegimeCalculator,
        Regime::New => &NewRegimeCalculator,
    }
}

/// HRA exemption: the least of the HRA received, the metro/non-metro
/// share of basic + DA, and rent in excess of 10% of basic + DA.  Zero
/// unless both rent and HRA are present.
pub fn hra_exemption(
    rules: &HraRules,
    rent_paid: f64,
    hra_received: f64,
    basic_salary: f64,
    da_component: f64,
    is_metro: bool,
) -> f64 {
    if rent_paid <= 0.0 || hra_received <= 0.0 {
        return 0.0;
    }
    let salary = basic_salary + da_component;
    let rate = if is_metro {
        rules.metro_rate
    } else {
        rules.non_metro_rate
    };
    let share_of_salary = salary * rate;
    let rent_over_threshold = (rent_paid - rules.rent_excess_rate * salary).max(0.0);
    hra_received
        .min(share_of_salary)
        .min(rent_over_threshold)
        .max(0.0)
}

/// Progressive tax on `taxable_income` under one regime's bands, before
/// rebate and cess.  Each band's rate applies only to the slice of
/// income inside that band.
pub fn slab_tax_with(rules: &RegimeRules, taxable_income: f64, age: u32) -> f64 {
    if taxable_income <= 0.0 {
        return 0.0;
    }
    let mut lower = rules.exemption.limit_for(age);
    let mut tax = 0.0;
    for slab in &rules.slabs {
        if taxable_income <= lower {
            break;
        }
        // A band that ends below the exemption limit is empty.
        let upper = slab.upto.map_or(f64::INFINITY, |upto| upto.max(lower));
        tax += (taxable_income.min(upper) - lower) * slab.rate;
        lower = upper;
    }
    tax
}

/// [`slab_tax_with`] against the built-in rules.
pub fn slab_tax(taxable_income: f64, regime: Regime, age: u32) -> f64 {
    let rules = TaxRules::builtin();
    let regime_rules = match regime {
        Regime::Old => &rules.old,
        Regime::New => &rules.new,
    };
    slab_tax_with(regime_rules, taxable_income, age)
}

/// [`hra_exemption`] against the built-in rules.
pub fn compute_hra_exemption(
    rent_paid: f64,
    hra_received: f64,
    basic_salary: f64,
    da_component: f64,
    is_metro: bool,
) -> f64 {
    hra_exemption(
        &TaxRules::builtin().hra,
        rent_paid,
        hra_received,
        basic_salary,
        da_component,
        is_metro,
    )
}

/// Old Regime breakdown under the built-in rules.
pub fn compute_old_regime(record: &TaxInputRecord) -> RegimeResult {
    OldRegimeCalculator.calculate(record, TaxRules::builtin())
}

/// New Regime breakdown under the built-in rules.
pub fn compute_new_regime(record: &TaxInputRecord) -> RegimeResult {
    NewRegimeCalculator.calculate(record, TaxRules::builtin())
}
