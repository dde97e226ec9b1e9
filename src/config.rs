use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// The Konami code, the default gate sequence.
pub const DEFAULT_SPELL: &str =
    "ArrowUp,ArrowUp,ArrowDown,ArrowDown,ArrowLeft,ArrowRight,ArrowLeft,ArrowRight,b,a,Enter";

/// What happens when the spell matches from an address that already has a
/// recorded cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Every match from a used address is denied, including re-matches by
    /// the identity that originally succeeded there.
    DenyRepeat,
    /// The identity recorded for the address keeps its success outcome on
    /// re-matches; everyone else from that address is denied.
    AllowHolder,
}

impl FromStr for ReplayPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "deny-repeat" => Ok(Self::DenyRepeat),
            "allow-holder" => Ok(Self::AllowHolder),
            other => Err(format!("unknown replay policy: {other}")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub spell: Vec<String>,
    pub database_path: String,
    pub trust_forwarded_for: bool,
    pub replay_policy: ReplayPolicy,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "8000"),
            spell: parse_spell(&try_load::<String>("SPELL_SEQUENCE", DEFAULT_SPELL)),
            database_path: try_load("DATABASE_PATH", "spellgate.redb"),
            trust_forwarded_for: try_load("TRUST_FORWARDED_FOR", "false"),
            replay_policy: try_load("REPLAY_POLICY", "deny-repeat"),
        }
    }
}

/// Splits a comma-separated key list. An empty or all-whitespace string
/// yields an empty spell, which disables the feature.
pub fn parse_spell(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
