// src/liveness/policy.rs

use std::fmt;
use std::time::Duration;

use regex::Regex;

use crate::config::LaunchChecks;
use crate::errors::{HerdError, Result};

/// How to tell that a service is up. Built from `launch_checks`, the first
/// configured of these wins:
///
/// 1. `log_text` / `log_pattern`
/// 2. `ports`
/// 3. `wait_ms`
/// 4. nothing configured: any listening port
#[derive(Debug, Clone)]
pub enum ReadinessPolicy {
    LogText(String),
    LogPattern(Regex),
    Ports(Vec<u16>),
    Delay(Duration),
    AnyPort,
}

impl ReadinessPolicy {
    pub fn from_checks(checks: Option<&LaunchChecks>) -> Result<Self> {
        let Some(checks) = checks else {
            return Ok(ReadinessPolicy::AnyPort);
        };
        if let Some(text) = checks.log_text.as_ref().filter(|t| !t.is_empty()) {
            return Ok(ReadinessPolicy::LogText(text.clone()));
        }
        if let Some(pattern) = checks.log_pattern.as_ref().filter(|p| !p.is_empty()) {
            let regex = Regex::new(pattern).map_err(|e| {
                HerdError::ConfigError(format!("invalid log_pattern {pattern:?}: {e}"))
            })?;
            return Ok(ReadinessPolicy::LogPattern(regex));
        }
        if !checks.ports.is_empty() {
            return Ok(ReadinessPolicy::Ports(checks.ports.clone()));
        }
        if let Some(ms) = checks.wait_ms {
            return Ok(ReadinessPolicy::Delay(Duration::from_millis(ms)));
        }
        Ok(ReadinessPolicy::AnyPort)
    }

    /// Whether a line of service output satisfies a log-based policy.
    pub fn matches_output(&self, message: &str) -> bool {
        match self {
            ReadinessPolicy::LogText(text) => message.contains(text.as_str()),
            ReadinessPolicy::LogPattern(regex) => regex.is_match(message),
            _ => false,
        }
    }
}

impl fmt::Display for ReadinessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessPolicy::LogText(text) => write!(f, "log text {text:?}"),
            ReadinessPolicy::LogPattern(regex) => write!(f, "log pattern /{}/", regex.as_str()),
            ReadinessPolicy::Ports(ports) => write!(f, "ports {ports:?}"),
            ReadinessPolicy::Delay(delay) => write!(f, "delay {delay:?}"),
            ReadinessPolicy::AnyPort => f.write_str("any listening port"),
        }
    }
}
