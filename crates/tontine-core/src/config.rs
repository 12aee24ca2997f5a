//! Service configuration.

use chrono::Duration;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::Cycle;

/// When a freshly materialized cycle becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationPolicy {
    /// Immediately on creation.
    #[default]
    OnCreate,
    /// On the first tick at or after the cycle's `cycle_month`.
    OnSchedule,
}

impl ActivationPolicy {
    pub(crate) fn allows(self, cycle: &Cycle, now: chrono::DateTime<chrono::Utc>) -> bool {
        match self {
            Self::OnCreate => true,
            Self::OnSchedule => cycle.is_due(now),
        }
    }
}

impl FromStr for ActivationPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "on_create" => Ok(Self::OnCreate),
            "on_schedule" => Ok(Self::OnSchedule),
            other => Err(Error::InvalidInput(format!(
                "unknown activation policy {other:?} (expected on_create or on_schedule)"
            ))),
        }
    }
}

/// Configuration for a [`Tontine`](crate::Tontine) service.
#[derive(Debug, Clone)]
pub struct TontineConfig {
    /// Pending invitations older than this expire on the next tick.
    pub invitation_ttl: Duration,

    /// Pending payments turn late this long after their due date.
    pub payment_grace: Duration,

    pub activation: ActivationPolicy,

    /// Invitees become active on acceptance without admin confirmation.
    pub auto_confirm_invitations: bool,
}

impl Default for TontineConfig {
    fn default() -> Self {
        Self {
            invitation_ttl: Duration::days(7),
            payment_grace: Duration::days(3),
            activation: ActivationPolicy::default(),
            auto_confirm_invitations: false,
        }
    }
}

impl TontineConfig {
    /// Read overrides from the environment, falling back to defaults:
    ///
    /// - `TONTINE_INVITATION_TTL_HOURS`
    /// - `TONTINE_PAYMENT_GRACE_HOURS`
    /// - `TONTINE_ACTIVATION` (`on_create` | `on_schedule`)
    /// - `TONTINE_AUTO_CONFIRM` (`true` | `false`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(hours) = lookup("TONTINE_INVITATION_TTL_HOURS") {
            config.invitation_ttl = parse_hours("TONTINE_INVITATION_TTL_HOURS", &hours)?;
        }
        if let Some(hours) = lookup("TONTINE_PAYMENT_GRACE_HOURS") {
            config.payment_grace = parse_hours("TONTINE_PAYMENT_GRACE_HOURS", &hours)?;
        }
        if let Some(policy) = lookup("TONTINE_ACTIVATION") {
            config.activation = policy.parse()?;
        }
        if let Some(flag) = lookup("TONTINE_AUTO_CONFIRM") {
            config.auto_confirm_invitations = parse_env("TONTINE_AUTO_CONFIRM", &flag)?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
        self.invitation_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_payment_grace(mut self, grace: Duration) -> Self {
        self.payment_grace = grace;
        self
    }

    #[must_use]
    pub fn with_activation(mut self, activation: ActivationPolicy) -> Self {
        self.activation = activation;
        self
    }

    #[must_use]
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm_invitations = auto_confirm;
        self
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid {key}: {value:?}")))
}

/// A non-negative whole number of hours that fits a [`Duration`].
fn parse_hours(key: &str, value: &str) -> Result<Duration> {
    let hours: i64 = parse_env(key, value)?;
    if hours < 0 {
        return Err(Error::InvalidInput(format!("{key} must not be negative, got {hours}")));
    }
    Duration::try_hours(hours)
        .ok_or_else(|| Error::InvalidInput(format!("{key} is out of range: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = TontineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.invitation_ttl, Duration::days(7));
        assert_eq!(config.payment_grace, Duration::days(3));
        assert_eq!(config.activation, ActivationPolicy::OnCreate);
        assert!(!config.auto_confirm_invitations);
    }

    #[test]
    fn env_overrides() {
        let config = TontineConfig::from_lookup(lookup(&[
            ("TONTINE_INVITATION_TTL_HOURS", "24"),
            ("TONTINE_PAYMENT_GRACE_HOURS", "12"),
            ("TONTINE_ACTIVATION", "on_schedule"),
            ("TONTINE_AUTO_CONFIRM", "true"),
        ]))
        .unwrap();
        assert_eq!(config.invitation_ttl, Duration::hours(24));
        assert_eq!(config.payment_grace, Duration::hours(12));
        assert_eq!(config.activation, ActivationPolicy::OnSchedule);
        assert!(config.auto_confirm_invitations);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        assert!(TontineConfig::from_lookup(lookup(&[("TONTINE_PAYMENT_GRACE_HOURS", "soon")])).is_err());
        assert!(TontineConfig::from_lookup(lookup(&[("TONTINE_ACTIVATION", "later")])).is_err());
        assert!(TontineConfig::from_lookup(lookup(&[("TONTINE_INVITATION_TTL_HOURS", "-1")])).is_err());
    }

    #[test]
    fn out_of_range_hours_are_rejected() {
        let err = TontineConfig::from_lookup(lookup(&[(
            "TONTINE_PAYMENT_GRACE_HOURS",
            "9000000000000000",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
