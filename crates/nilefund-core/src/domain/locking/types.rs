//! Lock types and configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Type of aggregate being locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Project aggregate (milestones and ledger included)
    Project,
    /// Loan account aggregate
    LoanAccount,
}

impl ResourceType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::LoanAccount => "loan_account",
        }
    }

    /// Lock key for a resource of this type
    pub fn lock_key(&self, id: impl fmt::Display) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for aggregate locks
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long to wait for an aggregate lock before giving up
    pub timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

impl LockConfig {
    /// Set the acquisition timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key() {
        assert_eq!(ResourceType::Project.lock_key("abc123"), "project:abc123");
        assert_eq!(ResourceType::LoanAccount.lock_key(7), "loan_account:7");
    }

    #[test]
    fn test_lock_config_builder() {
        let config = LockConfig::default().with_timeout(Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }
}
