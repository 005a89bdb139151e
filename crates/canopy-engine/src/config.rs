//! Node and engine configuration.
//!
//! Defaults come from `Default`; `from_env` overrides individual values from
//! `CANOPY_*` variables. Bad values are reported as [`Error::Config`].

use crate::admin_socket::default_socket_path;
use crate::error::{Error, Result};
use canopy_payout::{MatchingConfig, Money, SlabSchedule, SponsorBonus, TaxSchedule};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// A founder created at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FounderSeed {
    pub name: String,
    pub contact: String,
}

impl FounderSeed {
    pub fn new(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact: contact.into(),
        }
    }
}

/// Parse `Name <contact>, Other <contact2>`.
pub fn parse_founders(raw: &str) -> Result<Vec<FounderSeed>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, rest) = entry
                .split_once('<')
                .ok_or_else(|| Error::Config(format!("founder entry missing <contact>: {}", entry)))?;
            let contact = rest
                .strip_suffix('>')
                .ok_or_else(|| Error::Config(format!("founder entry missing '>': {}", entry)))?;
            let (name, contact) = (name.trim(), contact.trim());
            if name.is_empty() || contact.is_empty() {
                return Err(Error::Config(format!("empty founder name or contact: {}", entry)));
            }
            Ok(FounderSeed::new(name, contact))
        })
        .collect()
}

/// Rules the engine applies to every operation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seeded in order when no founder is stored
    pub founders: Vec<FounderSeed>,
    pub top_up_min: Money,
    pub top_up_max: Money,
    /// Time from withdrawal request to expected clearing
    pub withdrawal_clearance: Duration,
    pub matching: MatchingConfig,
    pub sponsor_bonus: SponsorBonus,
    pub slabs: SlabSchedule,
    pub tax: TaxSchedule,
    /// Extra attempts after a failed save
    pub save_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            founders: vec![FounderSeed::new("Founder", "founder@canopy.local")],
            top_up_min: Money::from_major(10),
            top_up_max: Money::from_major(50_000),
            withdrawal_clearance: Duration::from_secs(3 * 24 * 60 * 60),
            matching: MatchingConfig::default(),
            sponsor_bonus: SponsorBonus::default(),
            slabs: SlabSchedule::default(),
            tax: TaxSchedule::default(),
            save_retries: 2,
        }
    }
}

impl EngineConfig {
    /// Defaults with `CANOPY_*` overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("CANOPY_FOUNDERS") {
            let founders = parse_founders(&raw)?;
            if founders.is_empty() {
                return Err(Error::Config("CANOPY_FOUNDERS names no founders".into()));
            }
            config.founders = founders;
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_TOP_UP_MIN")? {
            config.top_up_min = v;
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_TOP_UP_MAX")? {
            config.top_up_max = v;
        }
        if let Some(hours) = parse_var::<u64, _>(&lookup, "CANOPY_CLEARANCE_HOURS")? {
            let secs = hours.checked_mul(60 * 60).ok_or_else(|| {
                Error::Config(format!("CANOPY_CLEARANCE_HOURS={} is out of range", hours))
            })?;
            config.withdrawal_clearance = Duration::from_secs(secs);
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_MATCH_THRESHOLD")? {
            config.matching.threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_MATCH_RATE_BPS")? {
            config.matching.rate_bps = v;
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_SPONSOR_BONUS_BPS")? {
            config.sponsor_bonus.rate_bps = v;
        }
        if let Some(v) = parse_var(&lookup, "CANOPY_SAVE_RETRIES")? {
            config.save_retries = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.top_up_min > self.top_up_max {
            return Err(Error::Config(format!(
                "top-up minimum {} exceeds maximum {}",
                self.top_up_min, self.top_up_max
            )));
        }
        for (what, bps) in [
            ("matching rate", self.matching.rate_bps),
            ("sponsor bonus", self.sponsor_bonus.rate_bps),
        ] {
            if u64::from(bps) > canopy_payout::BPS_SCALE {
                return Err(Error::Config(format!("{} of {} bps exceeds 100%", what, bps)));
            }
        }
        Ok(())
    }

    pub(crate) fn clearance_ms(&self) -> u64 {
        u64::try_from(self.withdrawal_clearance.as_millis()).unwrap_or(u64::MAX)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

/// Configuration for a Canopy node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for storage
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for canopy-admin CLI)
    pub admin_socket: PathBuf,

    pub engine: EngineConfig,
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(
            lookup("CANOPY_DATA_DIR").unwrap_or_else(|| "./canopy-data".to_string()),
        );

        let api_addr = parse_var(&lookup, "CANOPY_API_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let admin_socket = lookup("CANOPY_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_socket_path(&data_dir));

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            engine: EngineConfig::from_lookup(lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_pay_nothing() {
        let config = EngineConfig::default();
        assert_eq!(config.matching.rate_bps, 0);
        assert_eq!(config.sponsor_bonus.rate_bps, 0);
        assert_eq!(config.clearance_ms(), 3 * 24 * 60 * 60 * 1000);
        assert_eq!(config.founders.len(), 1);
    }

    #[test]
    fn overrides_apply() {
        let config = EngineConfig::from_lookup(env(&[
            ("CANOPY_FOUNDERS", "Ada <ada@example.com>, Grace <grace@example.com>"),
            ("CANOPY_MATCH_THRESHOLD", "500.50"),
            ("CANOPY_MATCH_RATE_BPS", "800"),
            ("CANOPY_SAVE_RETRIES", "5"),
        ]))
        .unwrap();
        assert_eq!(
            config.founders,
            vec![
                FounderSeed::new("Ada", "ada@example.com"),
                FounderSeed::new("Grace", "grace@example.com"),
            ]
        );
        assert_eq!(config.matching.threshold, Money::from_minor(50_050));
        assert_eq!(config.matching.rate_bps, 800);
        assert_eq!(config.save_retries, 5);
    }

    #[test]
    fn bad_values_are_config_errors() {
        for pairs in [
            [("CANOPY_MATCH_RATE_BPS", "lots")],
            [("CANOPY_MATCH_RATE_BPS", "20000")],
            [("CANOPY_FOUNDERS", "no-brackets")],
            [("CANOPY_TOP_UP_MIN", "90000")],
            [("CANOPY_CLEARANCE_HOURS", "18446744073709551615")],
            [("CANOPY_CLEARANCE_HOURS", "-3")],
        ] {
            assert!(matches!(
                EngineConfig::from_lookup(env(&pairs)),
                Err(Error::Config(_))
            ));
        }
    }

    #[test]
    fn node_config_defaults_follow_data_dir() {
        let config = NodeConfig::from_lookup(env(&[("CANOPY_DATA_DIR", "/tmp/canopy")])).unwrap();
        assert_eq!(config.admin_socket, PathBuf::from("/tmp/canopy/admin.sock"));
        assert_eq!(config.api_addr.port(), 8080);

        assert!(matches!(
            NodeConfig::from_lookup(env(&[("CANOPY_API_ADDR", "not-an-addr")])),
            Err(Error::Config(_))
        ));
    }
}
