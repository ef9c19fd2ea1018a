//! Environment records

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ControlError;
use crate::models::ids::EnvironmentId;

/// Persisted value meaning "no cap"
pub const UNLIMITED_CONCURRENCY: i64 = -1;

/// Typed view over an environment's concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    /// Any number of deployments may run at once
    Unlimited,

    /// At most this many deployments may be STARTED at once
    AtMost(u32),
}

impl TryFrom<i64> for ConcurrencyLimit {
    type Error = ControlError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            UNLIMITED_CONCURRENCY => Ok(ConcurrencyLimit::Unlimited),
            n if n >= 0 => u32::try_from(n)
                .map(ConcurrencyLimit::AtMost)
                .map_err(|_| {
                    ControlError::InvalidConfiguration(format!(
                        "concurrency limit {} is out of range",
                        n
                    ))
                }),
            n => Err(ControlError::InvalidConfiguration(format!(
                "concurrency limit must be -1 or non-negative, got {}",
                n
            ))),
        }
    }
}

impl From<ConcurrencyLimit> for i64 {
    fn from(limit: ConcurrencyLimit) -> Self {
        match limit {
            ConcurrencyLimit::Unlimited => UNLIMITED_CONCURRENCY,
            ConcurrencyLimit::AtMost(n) => i64::from(n),
        }
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyLimit::Unlimited => f.write_str("unlimited"),
            ConcurrencyLimit::AtMost(n) => write!(f, "{}", n),
        }
    }
}

/// A named deployment target with its own concurrency policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: EnvironmentId,

    pub name: String,

    /// Raw persisted limit: -1 for unlimited, otherwise a non-negative cap
    pub concurrency_limit: i64,

    #[serde(default)]
    pub service_port_coefficient: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_yaml: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_yaml: Option<String>,
}

impl Environment {
    /// Create an environment with the given limit and no manifest templates
    pub fn new(name: impl Into<String>, limit: ConcurrencyLimit) -> Self {
        Self {
            id: EnvironmentId::new(),
            name: name.into(),
            concurrency_limit: limit.into(),
            service_port_coefficient: 0,
            deployment_yaml: None,
            service_yaml: None,
        }
    }

    /// Parse the persisted limit
    pub fn concurrency_limit(&self) -> Result<ConcurrencyLimit, ControlError> {
        ConcurrencyLimit::try_from(self.concurrency_limit).map_err(|e| match e {
            ControlError::InvalidConfiguration(msg) => {
                ControlError::InvalidConfiguration(format!("environment {}: {}", self.id, msg))
            }
            other => other,
        })
    }
}
