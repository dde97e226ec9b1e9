//! # Gate
//!
//! Ties the spell tracker to the ledger: a matched spell only grants
//! access when the submitting address has never produced a successful
//! cast before. Access checks afterwards consult only the grant table,
//! so erasing an address record never revokes an existing grant.
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    config::ReplayPolicy,
    error::AppError,
    spell::SpellTracker,
    storage::{CastRecord, Ledger},
};

/// Per-keystroke result, for the boundary layer to translate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeystrokeOutcome {
    /// The trailing window equals the spell.
    pub matched: bool,
    /// This keystroke earned (or, under `AllowHolder`, re-confirmed) a grant.
    pub granted_now: bool,
    /// The sequence was correct but the address already cast the spell.
    pub replay_denied: bool,
}

pub struct Gate {
    tracker: SpellTracker,
    ledger: Ledger,
    policy: ReplayPolicy,
}

impl Gate {
    pub fn new(tracker: SpellTracker, ledger: Ledger, policy: ReplayPolicy) -> Self {
        Self {
            tracker,
            ledger,
            policy,
        }
    }

    /// Pushes one keystroke and runs the replay guard when the spell
    /// matches.
    ///
    /// A match with no determinable source address is a hard error. The
    /// guard must never fall through as if the address were fresh.
    pub fn register_keystroke(
        &self,
        identity: &str,
        key: &str,
        source_address: Option<&str>,
    ) -> Result<KeystrokeOutcome, AppError> {
        self.tracker.add_key(identity, key);

        if !self.tracker.check_spell(identity) {
            return Ok(KeystrokeOutcome::default());
        }

        let address = source_address.ok_or(AppError::UnknownSource)?;

        if self.ledger.address_used(address)? {
            if self.policy == ReplayPolicy::AllowHolder
                && self
                    .ledger
                    .cast_record(address)?
                    .is_some_and(|record| record.identity == identity)
            {
                return Ok(KeystrokeOutcome {
                    matched: true,
                    granted_now: true,
                    replay_denied: false,
                });
            }

            warn!("Spell matched by {identity} from already-used address {address}");
            return Ok(KeystrokeOutcome {
                matched: true,
                granted_now: false,
                replay_denied: true,
            });
        }

        self.ledger.record_cast(
            address,
            &CastRecord {
                identity: identity.to_string(),
                cast_time: Utc::now(),
            },
        )?;
        self.ledger.set_granted(identity, true)?;

        info!("Spell cast by {identity} from {address}, access granted");
        Ok(KeystrokeOutcome {
            matched: true,
            granted_now: true,
            replay_denied: false,
        })
    }

    /// Grant-table lookup only. Unknown identities resolve to false.
    pub fn check_access(&self, identity: &str) -> Result<bool, AppError> {
        Ok(self.ledger.granted(identity, false)?)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const SPELL: [&str; 3] = ["a", "b", "Enter"];

    fn gate(dir: &TempDir, policy: ReplayPolicy) -> Gate {
        let tracker = SpellTracker::new(SPELL.iter().map(|k| k.to_string()).collect());
        let ledger = Ledger::open(dir.path().join("ledger.redb")).unwrap();
        Gate::new(tracker, ledger, policy)
    }

    fn cast(gate: &Gate, identity: &str, address: Option<&str>) -> KeystrokeOutcome {
        let mut outcome = KeystrokeOutcome::default();
        for key in SPELL {
            outcome = gate.register_keystroke(identity, key, address).unwrap();
        }
        outcome
    }

    #[test]
    fn non_matching_keystrokes_report_nothing() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        let outcome = gate.register_keystroke("u1", "x", Some("1.2.3.4")).unwrap();
        assert_eq!(outcome, KeystrokeOutcome::default());
        assert!(!gate.check_access("u1").unwrap());
    }

    #[test]
    fn first_cast_from_an_address_grants_access() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        let outcome = cast(&gate, "u1", Some("1.2.3.4"));

        assert!(outcome.matched);
        assert!(outcome.granted_now);
        assert!(!outcome.replay_denied);
        assert!(gate.check_access("u1").unwrap());
    }

    #[test]
    fn second_identity_from_the_same_address_is_replay_denied() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        cast(&gate, "u1", Some("1.2.3.4"));
        let outcome = cast(&gate, "u2", Some("1.2.3.4"));

        assert!(outcome.matched);
        assert!(!outcome.granted_now);
        assert!(outcome.replay_denied);
        assert!(gate.check_access("u1").unwrap());
        assert!(!gate.check_access("u2").unwrap());
    }

    #[test]
    fn distinct_addresses_grant_independently() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        assert!(cast(&gate, "u1", Some("1.2.3.4")).granted_now);
        assert!(cast(&gate, "u2", Some("5.6.7.8")).granted_now);
        assert!(gate.check_access("u1").unwrap());
        assert!(gate.check_access("u2").unwrap());
    }

    #[test]
    fn deny_repeat_denies_even_the_original_caster() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        cast(&gate, "u1", Some("1.2.3.4"));
        let outcome = cast(&gate, "u1", Some("1.2.3.4"));

        assert!(outcome.replay_denied);
        assert!(!outcome.granted_now);
        // The earlier grant is untouched.
        assert!(gate.check_access("u1").unwrap());
    }

    #[test]
    fn allow_holder_keeps_success_for_the_recorded_identity() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::AllowHolder);

        cast(&gate, "u1", Some("1.2.3.4"));

        let holder = cast(&gate, "u1", Some("1.2.3.4"));
        assert!(holder.granted_now);
        assert!(!holder.replay_denied);

        let intruder = cast(&gate, "u2", Some("1.2.3.4"));
        assert!(intruder.replay_denied);
        assert!(!gate.check_access("u2").unwrap());
    }

    #[test]
    fn match_without_an_address_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir, ReplayPolicy::DenyRepeat);

        gate.register_keystroke("u1", "a", None).unwrap();
        gate.register_keystroke("u1", "b", None).unwrap();
        let err = gate.register_keystroke("u1", "Enter", None).unwrap_err();

        assert!(matches!(err, AppError::UnknownSource));
        assert!(!gate.check_access("u1").unwrap());
    }
}
