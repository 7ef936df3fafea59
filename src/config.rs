//! Server configuration.
//!
//! Settings come from environment variables, optionally seeded from a
//! `.env` file in the working directory:
//!
//! - `ITR_BIND_ADDR`: listen address, default `127.0.0.1:3000`.
//! - `ITR_TAX_RULES_DIR`: directory of JSON rule sets, default `tax_rules`.
//! - `ITR_INPUT_POLICY`: `coerce` (default) or `strict`.

use crate::input::NormalizationPolicy;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_RULES_DIR: &str = "tax_rules";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub tax_rules_dir: PathBuf,
    pub input_policy: NormalizationPolicy,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("ITR_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid ITR_BIND_ADDR '{bind_addr}'"))?;
        let tax_rules_dir =
            PathBuf::from(lookup("ITR_TAX_RULES_DIR").unwrap_or_else(|| DEFAULT_RULES_DIR.into()));
        let input_policy = match lookup("ITR_INPUT_POLICY") {
            Some(raw) => raw
                .parse::<NormalizationPolicy>()
                .map_err(anyhow::Error::msg)
                .context("invalid ITR_INPUT_POLICY")?,
            None => NormalizationPolicy::default(),
        };
        Ok(Self {
            bind_addr,
            tax_rules_dir,
            input_policy,
        })
    }
}
