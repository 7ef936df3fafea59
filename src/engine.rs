//! Regime comparison engine.
//!
//! The `engine` module runs both regime calculators on the same
//! [`TaxInputRecord`] and turns the pair into a [`ComparisonResult`]:
//! which regime is cheaper, by how much, and what remains payable (or
//! refundable) once withheld tax is credited.  Batches of records are
//! compared in parallel with [`rayon`]; each comparison reads only its
//! own record and the shared, read-only rules.

use crate::models::{ComparisonResult, Regime, TaxInputRecord};
use crate::rules::TaxRules;
use crate::tax::{NewRegimeCalculator, OldRegimeCalculator, RegimeCalculator};
use rayon::prelude::*;
use tracing::debug;

/// Per-call options for a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    /// Regime the settlement figures refer to.  `None` selects the
    /// recommended regime.
    pub selected_regime: Option<Regime>,
    /// Passed through to the result for display.
    pub is_estimated: bool,
}

/// Compare both regimes under the built-in rules.
pub fn compare(record: &TaxInputRecord) -> ComparisonResult {
    compare_with_rules(record, TaxRules::builtin(), CompareOptions::default())
}

/// Compare both regimes under `rules`.
pub fn compare_with_rules(
    record: &TaxInputRecord,
    rules: &TaxRules,
    options: CompareOptions,
) -> ComparisonResult {
    let old = OldRegimeCalculator.calculate(record, rules);
    let new = NewRegimeCalculator.calculate(record, rules);

    // strict: a tie goes to the new regime
    let recommended_regime = if old.total_tax < new.total_tax {
        Regime::Old
    } else {
        Regime::New
    };
    let savings_amount = (old.total_tax - new.total_tax).abs();
    let selected_regime = options.selected_regime.unwrap_or(recommended_regime);
    let tds_credit = record.tds_credit();
    let selected_tax = match selected_regime {
        Regime::Old => old.total_tax,
        Regime::New => new.total_tax,
    };

    debug!(
        year = %rules.assessment_year,
        old_tax = old.total_tax,
        new_tax = new.total_tax,
        recommended = %recommended_regime,
        "compared regimes"
    );

    ComparisonResult {
        old,
        new,
        recommended_regime,
        savings_amount,
        selected_regime,
        tds_credit,
        tds_mismatch: record.tds_mismatch(),
        final_payable_or_refund: selected_tax - tds_credit,
        is_estimated: options.is_estimated,
    }
}

/// Compare many records in parallel.  Results are in input order.
pub fn compare_batch(records: &[TaxInputRecord], rules: &TaxRules) -> Vec<ComparisonResult> {
    records
        .par_iter()
        .map(|record| compare_with_rules(record, rules, CompareOptions::default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settlement;
    use crate::tax::{compute_new_regime, compute_old_regime};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    /// Salary of 12L with 80C investments and savings interest, no rent.
    fn regression_record() -> TaxInputRecord {
        TaxInputRecord {
            gross_salary: 1_200_000.0,
            interest_income: 8_500.0,
            basic_salary: 600_000.0,
            hra_component: 150_000.0,
            rent_paid: 0.0,
            basic_80c: 110_000.0,
            age: 28,
            ..Default::default()
        }
    }

    #[test]
    fn regression_old_regime() {
        let old = compute_old_regime(&regression_record());
        let deductions = old.deductions.clone().unwrap();
        assert_eq!(deductions.hra_exemption, 0.0);
        assert_close(old.gross_total_income, 1_208_500.0);
        assert_close(old.total_deductions, 168_500.0);
        assert_close(old.taxable_income, 1_040_000.0);
        assert_close(old.tax_before_rebate, 124_500.0);
        assert_eq!(old.rebate_amount, 0.0);
        assert_close(old.cess_amount, 4_980.0);
        assert_eq!(old.total_tax, 129_480.0);
    }

    #[test]
    fn regression_new_regime() {
        let new = compute_new_regime(&regression_record());
        assert_close(new.taxable_income, 1_133_500.0);
        // 15000 + 30000 + 233500 * 15%
        assert_close(new.tax_before_rebate, 80_025.0);
        assert_eq!(new.rebate_amount, 0.0);
        assert_close(new.cess_amount, 3_201.0);
        assert_eq!(new.total_tax, 83_226.0);
    }

    #[test]
    fn regression_comparison() {
        let result = compare(&regression_record());
        assert_eq!(result.recommended_regime, Regime::New);
        assert_eq!(result.savings_amount, 46_254.0);
        assert_eq!(result.selected_regime, Regime::New);
        assert_eq!(result.selected().total_tax, 83_226.0);
    }

    #[test]
    fn tie_goes_to_new_regime() {
        // both regimes fully rebated
        let record = TaxInputRecord {
            gross_salary: 500_000.0,
            ..Default::default()
        };
        let result = compare(&record);
        assert_eq!(result.old.total_tax, result.new.total_tax);
        assert_eq!(result.recommended_regime, Regime::New);
        assert_eq!(result.savings_amount, 0.0);

        let empty = compare(&TaxInputRecord::default());
        assert_eq!(empty.recommended_regime, Regime::New);
    }

    #[test]
    fn old_regime_recommended_with_heavy_deductions() {
        let record = TaxInputRecord {
            gross_salary: 1_500_000.0,
            basic_salary: 750_000.0,
            hra_component: 300_000.0,
            rent_paid: 360_000.0,
            is_metro: true,
            basic_80c: 150_000.0,
            nps_contribution: 50_000.0,
            health_insurance: 25_000.0,
            education_loan_interest: 100_000.0,
            professional_tax: 2_500.0,
            ..Default::default()
        };
        let result = compare(&record);
        assert!(result.old.total_tax < result.new.total_tax);
        assert_eq!(result.recommended_regime, Regime::Old);
        assert_eq!(
            result.savings_amount,
            result.new.total_tax - result.old.total_tax
        );
    }

    #[test]
    fn settlement_against_tds() {
        let record = TaxInputRecord {
            tds_26as: 100_000.0,
            tds_form16: 90_000.0,
            ..regression_record()
        };
        let result = compare(&record);
        assert_eq!(result.tds_credit, 100_000.0);
        assert!(result.tds_mismatch);
        assert_eq!(result.final_payable_or_refund, 83_226.0 - 100_000.0);
        assert_eq!(result.settlement(), Settlement::Refund(16_774.0));

        let pinned = compare_with_rules(
            &record,
            TaxRules::builtin(),
            CompareOptions {
                selected_regime: Some(Regime::Old),
                is_estimated: true,
            },
        );
        assert_eq!(pinned.recommended_regime, Regime::New);
        assert_eq!(pinned.selected_regime, Regime::Old);
        assert_eq!(pinned.final_payable_or_refund, 29_480.0);
        assert_eq!(pinned.settlement(), Settlement::Payable(29_480.0));
        assert!(pinned.is_estimated);
    }

    #[test]
    fn form16_credited_when_26as_is_empty() {
        let record = TaxInputRecord {
            tds_26as: 0.0,
            tds_form16: 60_000.0,
            ..regression_record()
        };
        let result = compare(&record);
        assert!(result.tds_mismatch);
        assert_eq!(result.tds_credit, 60_000.0);
        assert_eq!(result.final_payable_or_refund, 83_226.0 - 60_000.0);
        assert_eq!(result.settlement(), Settlement::Payable(23_226.0));

        let matched = compare(&TaxInputRecord {
            tds_26as: 60_000.0,
            ..record
        });
        assert!(!matched.tds_mismatch);
        assert_eq!(matched.tds_credit, 60_000.0);
    }

    #[test]
    fn nil_settlement() {
        let result = compare(&TaxInputRecord::default());
        assert_eq!(result.settlement(), Settlement::Nil);
    }

    #[test]
    fn regimes_are_independent() {
        let record = regression_record();
        let result = compare(&record);
        assert_eq!(result.old, compute_old_regime(&record));
        assert_eq!(result.new, compute_new_regime(&record));
    }

    #[test]
    fn batch_preserves_order() {
        let records: Vec<TaxInputRecord> = (0..64)
            .map(|i| TaxInputRecord {
                gross_salary: 300_000.0 + f64::from(i) * 50_000.0,
                ..Default::default()
            })
            .collect();
        let results = compare_batch(&records, TaxRules::builtin());
        assert_eq!(results.len(), records.len());
        for (record, result) in records.iter().zip(&results) {
            assert_eq!(result, &compare(record));
        }
    }
}
