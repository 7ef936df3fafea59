//! HTTP API for the ITR Engine.
//!
//! This module exposes a minimal REST API around the comparison engine
//! using the [`axum`](https://crates.io/crates/axum) framework.  Clients
//! post the flat field object collected by the filing wizard and get
//! the regime breakdowns back as JSON.  Every request normalises its own
//! fresh record; the only shared state is the read-only rule registry.

use crate::engine::{compare_batch, compare_with_rules, CompareOptions};
use crate::error::ApiError;
use crate::input::{normalize, normalize_value, ExtractedFields, NormalizationPolicy};
use crate::models::{ComparisonResult, Regime, RegimeResult};
use crate::rules::{RuleRegistry, TaxRules};
use crate::tax::calculator_for;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Application state shared across requests.
pub struct AppState {
    pub rules: RuleRegistry,
    pub input_policy: NormalizationPolicy,
}

impl AppState {
    fn rules_for(&self, year: Option<&str>) -> Result<&TaxRules, ApiError> {
        self.rules.get(year).ok_or_else(|| {
            ApiError::UnknownAssessmentYear(year.unwrap_or(self.rules.default_year()).to_string())
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        debug!(status = status.as_u16(), error = %self, "request rejected");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Body of `POST /api/compare`: the flat form fields plus two optional
/// controls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest {
    #[serde(default)]
    selected_regime: Option<String>,
    #[serde(default)]
    assessment_year: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Body of `POST /api/extracted`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedRequest {
    #[serde(default)]
    base: Map<String, Value>,
    extracted: ExtractedFields,
    #[serde(default)]
    selected_regime: Option<String>,
    #[serde(default)]
    assessment_year: Option<String>,
}

/// Query string of `POST /api/compare/batch`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchQuery {
    #[serde(default)]
    assessment_year: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RulesResponse {
    default_year: String,
    years: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

fn parse_regime(raw: &str) -> Result<Regime, ApiError> {
    raw.parse::<Regime>()
        .map_err(|_| ApiError::UnknownRegime(raw.to_string()))
}

fn parse_selection(raw: Option<&str>) -> Result<Option<Regime>, ApiError> {
    raw.map(parse_regime).transpose()
}

/// Build the API router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/rules", get(rules_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/compare/batch", post(batch_handler))
        .route("/api/regime/:regime", post(regime_handler))
        .route("/api/extracted", post(extracted_handler))
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn rules_handler(State(state): State<Arc<AppState>>) -> Json<RulesResponse> {
    Json(RulesResponse {
        default_year: state.rules.default_year().to_string(),
        years: state.rules.years(),
    })
}

/// Handler for POST /api/compare
async fn compare_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let rules = state.rules_for(request.assessment_year.as_deref())?;
    let selected_regime = parse_selection(request.selected_regime.as_deref())?;
    let input = normalize(&request.fields, state.input_policy)?;
    let options = CompareOptions {
        selected_regime,
        is_estimated: input.is_estimated,
    };
    Ok(Json(compare_with_rules(&input.record, rules, options)))
}

/// Handler for POST /api/regime/:regime
async fn regime_handler(
    State(state): State<Arc<AppState>>,
    Path(regime): Path<String>,
    Json(fields): Json<Value>,
) -> Result<Json<RegimeResult>, ApiError> {
    let regime = parse_regime(&regime)?;
    let year = fields.get("assessmentYear").and_then(Value::as_str);
    let rules = state.rules_for(year)?;
    let input = normalize_value(&fields, state.input_policy)?;
    Ok(Json(calculator_for(regime).calculate(&input.record, rules)))
}

/// Handler for POST /api/compare/batch
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
    Json(items): Json<Vec<Value>>,
) -> Result<Json<Vec<ComparisonResult>>, ApiError> {
    let rules = state.rules_for(query.assessment_year.as_deref())?;
    let inputs = items
        .iter()
        .map(|item| normalize_value(item, state.input_policy))
        .collect::<Result<Vec<_>, _>>()?;
    let records: Vec<_> = inputs.iter().map(|input| input.record.clone()).collect();
    let mut results = compare_batch(&records, rules);
    for (result, input) in results.iter_mut().zip(&inputs) {
        result.is_estimated = input.is_estimated;
    }
    debug!(count = results.len(), "compared batch");
    Ok(Json(results))
}

/// Handler for POST /api/extracted
async fn extracted_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractedRequest>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let rules = state.rules_for(request.assessment_year.as_deref())?;
    let selected_regime = parse_selection(request.selected_regime.as_deref())?;
    let base = normalize(&request.base, state.input_policy)?;
    let record = request.extracted.apply_to(&base.record);
    let options = CompareOptions {
        selected_regime,
        is_estimated: request.extracted.is_estimated() || base.is_estimated,
    };
    Ok(Json(compare_with_rules(&record, rules, options)))
}

/// Launch the API server and block until it terminates.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let router = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(policy: NormalizationPolicy) -> Router {
        router(Arc::new(AppState {
            rules: RuleRegistry::default(),
            input_policy: policy,
        }))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |value| Body::from(value.to_string()));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn form() -> Value {
        json!({
            "grossSalary": "12,00,000",
            "interestIncome": 8500,
            "basicSalary": 600000,
            "hraComponent": 150000,
            "basic80c": 110000,
            "age": 28,
            "tds_26as": 90000
        })
    }

    #[tokio::test]
    async fn health() {
        let (status, body) = send(app(NormalizationPolicy::Coerce), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn compare_recommends_new() {
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare", Some(form())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendedRegime"], "new");
        assert_eq!(body["old"]["totalTax"], 129480.0);
        assert_eq!(body["new"]["totalTax"], 83226.0);
        assert_eq!(body["savingsAmount"], 46254.0);
        assert_eq!(body["tdsCredit"], 90000.0);
        assert_eq!(body["finalPayableOrRefund"], -6774.0);
    }

    #[tokio::test]
    async fn compare_honours_selection() {
        let mut request = form();
        request["selectedRegime"] = json!("old");
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selectedRegime"], "old");
        assert_eq!(body["finalPayableOrRefund"], 39480.0);
    }

    #[tokio::test]
    async fn unknown_year_is_not_found() {
        let mut request = form();
        request["assessmentYear"] = json!("2011-12");
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare", Some(request)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("2011-12"));
    }

    #[tokio::test]
    async fn strict_policy_rejects_negative_rent() {
        let mut request = form();
        request["rentPaid"] = json!(-5000);
        let (status, body) =
            send(app(NormalizationPolicy::Strict), "POST", "/api/compare", Some(request.clone()))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("rentPaid"));

        let (status, _) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn single_regime() {
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/regime/old", Some(form())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["regime"], "old");
        assert_eq!(body["totalTax"], 129480.0);
        assert_eq!(body["deductions"]["section80c"], 110000.0);

        let (status, _) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/regime/flat", Some(form())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn batch() {
        let items = json!([form(), { "grossSalary": 500000 }, { "isEstimated": "true" }]);
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare/batch", Some(items)).await;
        assert_eq!(status, StatusCode::OK);
        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["new"]["totalTax"], 83226.0);
        assert_eq!(results[1]["old"]["totalTax"], 0.0);
        assert_eq!(results[2]["isEstimated"], true);
    }

    #[tokio::test]
    async fn batch_uses_requested_year() {
        let mut rules = TaxRules::fy2024_25();
        rules.assessment_year = "2026-27".into();
        rules.cess_rate = 0.0;
        let mut registry = RuleRegistry::default();
        registry.insert(rules);
        let app = router(Arc::new(AppState {
            rules: registry,
            input_policy: NormalizationPolicy::Coerce,
        }));

        let items = json!([form()]);
        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/compare/batch?assessmentYear=2026-27",
            Some(items.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // 80025 slab tax with no cess
        assert_eq!(body[0]["new"]["totalTax"], 80025.0);

        let (status, body) =
            send(app.clone(), "POST", "/api/compare/batch", Some(items.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["new"]["totalTax"], 83226.0);

        let (status, _) = send(
            app,
            "POST",
            "/api/compare/batch?assessmentYear=2011-12",
            Some(items),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn compare_flags_tds_mismatch() {
        let mut request = form();
        request["tds_26as"] = json!(0);
        request["tds_form16"] = json!(60000);
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/compare", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tdsMismatch"], true);
        assert_eq!(body["tdsCredit"], 60000.0);
        assert_eq!(body["old"]["ageCategory"], "normal");
        assert_eq!(body["old"]["deductions"]["section80cRemaining"], 40000.0);
        assert!(body["new"].get("ageCategory").is_none());
    }

    #[tokio::test]
    async fn extracted_overrides_form() {
        let request = json!({
            "base": { "rentPaid": 0, "age": 28, "interestIncome": 8500 },
            "extracted": {
                "grossSalary": 1200000,
                "basicSalary": 600000,
                "hraComponent": 150000,
                "tds_form16": 80000,
                "basic80c": 110000,
                "professionalTax": null,
                "isEstimated": true
            }
        });
        let (status, body) =
            send(app(NormalizationPolicy::Coerce), "POST", "/api/extracted", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["old"]["totalTax"], 129480.0);
        assert_eq!(body["tdsCredit"], 80000.0);
        assert_eq!(body["isEstimated"], true);
    }

    #[tokio::test]
    async fn lists_rule_sets() {
        let (status, body) = send(app(NormalizationPolicy::Coerce), "GET", "/api/rules", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["defaultYear"], "2025-26");
        assert_eq!(body["years"], json!(["2025-26"]));
    }
}
