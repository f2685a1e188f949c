//! Operator configuration from flags and environment

use std::collections::BTreeMap;
use std::time::Duration;

use clap::Args;
use resolution_common::duration::parse_duration;
use resolution_common::DEFAULT_SYSTEM_NAMESPACE;

/// Settings shared by the controller and the one-shot resolve command
#[derive(Args, Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace holding `<type>-resolver-config` ConfigMaps
    #[arg(long, env = "RESOLUTION_NAMESPACE", default_value = DEFAULT_SYSTEM_NAMESPACE)]
    pub namespace: String,

    /// Ceiling on how long a request may stay unresolved
    #[arg(
        long,
        env = "RESOLUTION_MAX_DURATION",
        default_value = "1m",
        value_parser = parse_duration_arg
    )]
    pub max_resolution_duration: Duration,

    /// Resolver timeout when no `timeout` is configured for the resolver
    #[arg(
        long,
        env = "RESOLUTION_DEFAULT_TIMEOUT",
        default_value = "1m",
        value_parser = parse_duration_arg
    )]
    pub default_resolver_timeout: Duration,
}

/// clap value parser for duration flags
pub fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// clap value parser for `key=value` pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

/// Collect `key=value` pairs into a map; later keys win
pub fn into_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}
