//! Input normalisation.
//!
//! The wizard and the document extractor both hand over a flat JSON
//! object whose values may be numbers, numeric strings (possibly with
//! `₹` and Indian digit grouping), booleans spelled as strings, or
//! nothing at all.  [`normalize`] turns that object into a typed
//! [`TaxInputRecord`] before any arithmetic happens, under one of two
//! policies: coerce anything unusable to zero, or reject it.

use crate::error::InputError;
use crate::models::{TaxInputRecord, DEFAULT_AGE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::{debug, warn};

/// How unusable field values are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationPolicy {
    /// Non-numeric or non-finite values become 0 and negative amounts
    /// are clamped to 0.  Never fails.
    #[default]
    Coerce,
    /// Non-numeric, non-finite or negative values are rejected.
    Strict,
}

impl FromStr for NormalizationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coerce" => Ok(NormalizationPolicy::Coerce),
            "strict" => Ok(NormalizationPolicy::Strict),
            other => Err(format!("unknown input policy '{other}'")),
        }
    }
}

/// A normalised record plus the informational payslip flag.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInput {
    pub record: TaxInputRecord,
    /// Figures were annualised from a monthly payslip.  Display only.
    pub is_estimated: bool,
}

/// Keys the form may send that carry no meaning for the computation.
const IGNORED_KEYS: &[&str] = &[
    "medicalAllowance",
    "flexiAllowance",
    "overtimeAmount",
    "transportationAllowance",
    "itrAckNumber",
    "isDataParsed",
    "extractedText",
    "selectedRegime",
    "assessmentYear",
];

/// Normalise a flat field map into a [`TaxInputRecord`].
pub fn normalize(
    fields: &Map<String, Value>,
    policy: NormalizationPolicy,
) -> Result<NormalizedInput, InputError> {
    let reader = FieldReader { fields, policy };

    let record = TaxInputRecord {
        gross_salary: reader.amount("grossSalary")?,
        basic_salary: reader.amount("basicSalary")?,
        hra_component: reader.amount("hraComponent")?,
        da_component: reader.amount("daComponent")?,
        rent_paid: reader.amount("rentPaid")?,
        is_metro: reader.flag("isMetro")?,
        interest_income: reader.amount("interestIncome")?,
        professional_tax: reader.amount("professionalTax")?,
        basic_80c: reader.amount("basic80c")?,
        lic_premium: reader.amount("licPremium")?,
        health_insurance: reader.amount("healthInsurance")?,
        education_loan_interest: reader.amount("educationLoanInterest")?,
        leave_travel_assistance: reader.amount_or_alias("leaveTravelAssistance", "lta")?,
        nps_contribution: reader.amount("npsContribution")?,
        tds_26as: reader.amount("tds_26as")?,
        tds_form16: reader.amount("tds_form16")?,
        age: reader.age("age")?,
    };
    let is_estimated = reader.flag("isEstimated")?;

    for key in fields.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) && !IGNORED_KEYS.contains(&key.as_str()) {
            debug!(field = %key, "ignoring unrecognised input field");
        }
    }

    Ok(NormalizedInput {
        record,
        is_estimated,
    })
}

/// Normalise an arbitrary JSON value, which must be an object.
pub fn normalize_value(
    value: &Value,
    policy: NormalizationPolicy,
) -> Result<NormalizedInput, InputError> {
    match value {
        Value::Object(fields) => normalize(fields, policy),
        _ => Err(InputError::NotAnObject),
    }
}

const KNOWN_KEYS: &[&str] = &[
    "grossSalary",
    "basicSalary",
    "hraComponent",
    "daComponent",
    "rentPaid",
    "isMetro",
    "interestIncome",
    "professionalTax",
    "basic80c",
    "licPremium",
    "healthInsurance",
    "educationLoanInterest",
    "leaveTravelAssistance",
    "lta",
    "npsContribution",
    "tds_26as",
    "tds_form16",
    "age",
    "isEstimated",
];

struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    policy: NormalizationPolicy,
}

impl FieldReader<'_> {
    /// A non-negative amount; absent, null and blank read as 0.
    fn amount(&self, field: &str) -> Result<f64, InputError> {
        let Some(raw) = self.number(field)? else {
            return Ok(0.0);
        };
        if raw >= 0.0 {
            return Ok(raw);
        }
        match self.policy {
            NormalizationPolicy::Coerce => {
                warn!(field, value = raw, "negative amount clamped to 0");
                Ok(0.0)
            }
            NormalizationPolicy::Strict => Err(InputError::Negative {
                field: field.to_string(),
                value: raw,
            }),
        }
    }

    /// `field`, falling back to `alias` when `field` is absent, null or
    /// blank.
    fn amount_or_alias(&self, field: &str, alias: &str) -> Result<f64, InputError> {
        if self.is_present(field) {
            self.amount(field)
        } else {
            self.amount(alias)
        }
    }

    fn is_present(&self, field: &str) -> bool {
        match self.fields.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !clean_numeric(s).is_empty(),
            Some(_) => true,
        }
    }

    /// Whole years; fractions are truncated.
    fn age(&self, field: &str) -> Result<u32, InputError> {
        let Some(raw) = self.number(field)? else {
            return Ok(DEFAULT_AGE);
        };
        if raw < 0.0 {
            return match self.policy {
                NormalizationPolicy::Coerce => {
                    warn!(field, value = raw, "negative age clamped to 0");
                    Ok(0)
                }
                NormalizationPolicy::Strict => Err(InputError::Negative {
                    field: field.to_string(),
                    value: raw,
                }),
            };
        }
        // saturating float-to-int cast
        Ok(raw.trunc() as u32)
    }

    /// The raw numeric value, or `None` when the field is absent or
    /// blank.  Unusable values are 0 under `Coerce`.
    fn number(&self, field: &str) -> Result<Option<f64>, InputError> {
        let parsed = match self.fields.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => {
                let cleaned = clean_numeric(s);
                if cleaned.is_empty() {
                    return Ok(None);
                }
                cleaned.parse::<f64>().ok()
            }
            Some(_) => None,
        };
        match parsed.filter(|n| n.is_finite()) {
            Some(n) => Ok(Some(n)),
            None => match self.policy {
                NormalizationPolicy::Coerce => {
                    warn!(field, value = %self.display(field), "non-numeric value read as 0");
                    Ok(Some(0.0))
                }
                NormalizationPolicy::Strict => Err(InputError::NotNumeric {
                    field: field.to_string(),
                    value: self.display(field),
                }),
            },
        }
    }

    /// `true` only for JSON `true` or the string "true".
    fn flag(&self, field: &str) -> Result<bool, InputError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(false),
            Some(_) => match self.policy {
                NormalizationPolicy::Coerce => {
                    warn!(field, value = %self.display(field), "unrecognised flag read as false");
                    Ok(false)
                }
                NormalizationPolicy::Strict => Err(InputError::NotBoolean {
                    field: field.to_string(),
                    value: self.display(field),
                }),
            },
        }
    }

    fn display(&self, field: &str) -> String {
        self.fields
            .get(field)
            .map(Value::to_string)
            .unwrap_or_default()
    }
}

/// Strip currency symbols, digit grouping and whitespace.
fn clean_numeric(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ',' | '₹') && !c.is_whitespace())
        .collect()
}

/// Fields returned by the document-extraction service.  Any of them may
/// be null when the document did not show it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedFields {
    pub gross_salary: Option<f64>,
    pub basic_salary: Option<f64>,
    pub hra_component: Option<f64>,
    #[serde(rename = "tds_form16")]
    pub tds_form16: Option<f64>,
    #[serde(rename = "basic80c")]
    pub basic_80c: Option<f64>,
    pub professional_tax: Option<f64>,
    /// The source was a monthly payslip and the figures were multiplied
    /// by 12 upstream.
    pub is_estimated: Option<bool>,
}

impl ExtractedFields {
    /// A new record with every extracted amount laid over `base`.
    pub fn apply_to(&self, base: &TaxInputRecord) -> TaxInputRecord {
        let pick = |extracted: Option<f64>, current: f64| match extracted {
            Some(v) if v.is_finite() => v.max(0.0),
            _ => current,
        };
        TaxInputRecord {
            gross_salary: pick(self.gross_salary, base.gross_salary),
            basic_salary: pick(self.basic_salary, base.basic_salary),
            hra_component: pick(self.hra_component, base.hra_component),
            tds_form16: pick(self.tds_form16, base.tds_form16),
            basic_80c: pick(self.basic_80c, base.basic_80c),
            professional_tax: pick(self.professional_tax, base.professional_tax),
            ..base.clone()
        }
    }

    pub fn is_estimated(&self) -> bool {
        self.is_estimated.unwrap_or(false)
    }
}
