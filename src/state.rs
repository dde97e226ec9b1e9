use std::sync::Arc;

use crate::{
    config::Config,
    gate::Gate,
    spell::SpellTracker,
    storage::{Ledger, LedgerError},
};

pub struct State {
    pub config: Config,
    pub gate: Gate,
}

impl State {
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::load()).expect("Database misconfigured!")
    }

    /// Builds the state from an explicit config. Tests use this to point
    /// the ledger at a temporary file.
    pub fn with_config(config: Config) -> Result<Arc<Self>, LedgerError> {
        let ledger = Ledger::open(&config.database_path)?;
        let tracker = SpellTracker::new(config.spell.clone());
        let gate = Gate::new(tracker, ledger, config.replay_policy);

        Ok(Arc::new(Self { config, gate }))
    }
}
