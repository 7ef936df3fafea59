//! Entry point for the ITR Engine binary.
//!
//! Running this binary starts an HTTP server that exposes the regime
//! comparison API.  Configuration is read from the environment (see
//! [`itr_engine::config`]); rule sets for additional assessment years
//! are loaded from the configured rules directory at start-up.

use anyhow::Context;
use itr_engine::api::{self, AppState};
use itr_engine::config::Config;
use itr_engine::rules::RuleRegistry;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itr_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let rules = RuleRegistry::load(&config.tax_rules_dir).with_context(|| {
        format!(
            "failed to load rule sets from {}",
            config.tax_rules_dir.display()
        )
    })?;
    info!(
        years = ?rules.years(),
        policy = ?config.input_policy,
        "rule sets loaded"
    );

    let state = AppState {
        rules,
        input_policy: config.input_policy,
    };
    api::serve(config.bind_addr, state).await
}
