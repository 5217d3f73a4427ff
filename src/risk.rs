//! External risk feed.
//!
//! Portfolio VaR and a qualitative tier come from an outside service. The feed
//! can fail or go stale at any time, and nothing in liquidation may wait on it:
//! callers treat every error as "no assessment" and fall back to margin-only
//! decisions.

use crate::types::{AccountId, Bps, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Portfolio value-at-risk, 10000 = reference level
    pub var: Bps,
    pub tier: RiskTier,
    pub assessed_at: Timestamp,
}

impl RiskAssessment {
    pub fn new(var: Bps, tier: RiskTier, assessed_at: Timestamp) -> Self {
        Self {
            var,
            tier,
            assessed_at,
        }
    }

    pub fn is_high(&self) -> bool {
        self.tier == RiskTier::High
    }

    pub fn is_stale(&self, now: Timestamp, max_age_ms: i64) -> bool {
        now.millis_since(self.assessed_at) > max_age_ms
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFeedParams {
    /// Assessments older than this are ignored
    pub max_assessment_age_ms: i64,
}

impl Default for RiskFeedParams {
    fn default() -> Self {
        Self {
            max_assessment_age_ms: 600_000,
        }
    }
}

pub trait RiskFeed: Send + fmt::Debug {
    fn portfolio_risk(&self, account: AccountId) -> Result<RiskAssessment, RiskFeedError>;
}

/// Reads the feed and collapses failures and stale answers into `None`.
pub fn fresh_assessment(
    feed: &dyn RiskFeed,
    account: AccountId,
    now: Timestamp,
    params: &RiskFeedParams,
) -> Option<RiskAssessment> {
    match feed.portfolio_risk(account) {
        Ok(assessment) if assessment.is_stale(now, params.max_assessment_age_ms) => {
            tracing::warn!(%account, assessed_at = assessment.assessed_at.as_millis(), "stale risk assessment ignored");
            None
        }
        Ok(assessment) => Some(assessment),
        Err(err) => {
            tracing::warn!(%account, error = %err, "risk feed unavailable, using margin-only priority");
            None
        }
    }
}

/// Feed with no backend. Every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRiskFeed;

impl RiskFeed for UnavailableRiskFeed {
    fn portfolio_risk(&self, _account: AccountId) -> Result<RiskAssessment, RiskFeedError> {
        Err(RiskFeedError::Unavailable)
    }
}

/// In-memory feed. Assessments are pushed in by the owner; `set_outage`
/// simulates the service going dark.
#[derive(Debug, Clone, Default)]
pub struct StaticRiskFeed {
    assessments: HashMap<AccountId, RiskAssessment>,
    outage: bool,
}

impl StaticRiskFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, account: AccountId, assessment: RiskAssessment) -> Self {
        self.set(account, assessment);
        self
    }

    pub fn set(&mut self, account: AccountId, assessment: RiskAssessment) {
        self.assessments.insert(account, assessment);
    }

    pub fn set_outage(&mut self, outage: bool) {
        self.outage = outage;
    }
}

impl RiskFeed for StaticRiskFeed {
    fn portfolio_risk(&self, account: AccountId) -> Result<RiskAssessment, RiskFeedError> {
        if self.outage {
            return Err(RiskFeedError::Timeout);
        }
        self.assessments
            .get(&account)
            .copied()
            .ok_or(RiskFeedError::UnknownAccount(account))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskFeedError {
    #[error("Risk feed unavailable")]
    Unavailable,

    #[error("Risk feed timed out")]
    Timeout,

    #[error("No risk assessment for {0}")]
    UnknownAccount(AccountId),
}
