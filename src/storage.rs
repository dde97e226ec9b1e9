//! # Ledger
//!
//! Durable access state backed by [redb], an embedded key-value store.
//!
//! ## Requirements
//!
//! - Two small record sets: grants (identity -> bool) and spell
//!   addresses (address -> identity + cast time)
//! - Upserts and point lookups, a full scan only for maintenance
//! - State must survive process restarts and reopen from the same file
//!
//! ## Implementation
//!
//! - One table per record set, identity/address as the unique key
//! - Address records serialized as JSON, grants stored as raw bools
//! - Every operation is a single transaction; writes commit before
//!   returning, so partial updates are never visible
//!
//! The ledger never enforces first-write-wins on addresses. Callers that
//! care must check [`Ledger::address_used`] before
//! [`Ledger::record_cast`]; that policy lives in the gate.
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GRANTS: TableDefinition<&str, bool> = TableDefinition::new("grants");
const SPELL_ADDRESSES: TableDefinition<&str, Vec<u8>> = TableDefinition::new("spell_addresses");

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Who first cast the spell from an address, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastRecord {
    pub identity: String,
    pub cast_time: DateTime<Utc>,
}

pub struct Ledger {
    db: Database,
}

impl Ledger {
    /// Opens the ledger file, creating it and both tables if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db = Database::create(path)?;

        let tx = db.begin_write()?;
        tx.open_table(GRANTS)?;
        tx.open_table(SPELL_ADDRESSES)?;
        tx.commit()?;

        Ok(Self { db })
    }

    /// Idempotent upsert of an identity's grant flag.
    pub fn set_granted(&self, identity: &str, granted: bool) -> Result<(), LedgerError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(GRANTS)?;
            table.insert(identity, granted)?;
        }
        tx.commit()?;

        Ok(())
    }

    /// Stored grant flag, or `default` for identities never recorded.
    pub fn granted(&self, identity: &str, default: bool) -> Result<bool, LedgerError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(GRANTS)?;

        Ok(table.get(identity)?.map(|v| v.value()).unwrap_or(default))
    }

    /// Whether any cast has been recorded from this address.
    pub fn address_used(&self, address: &str) -> Result<bool, LedgerError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(SPELL_ADDRESSES)?;

        Ok(table.get(address)?.is_some())
    }

    /// Associates an address with a cast. Overwrites silently; check
    /// [`Ledger::address_used`] first when first-write-wins matters.
    pub fn record_cast(&self, address: &str, record: &CastRecord) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec(record)?;

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(SPELL_ADDRESSES)?;
            table.insert(address, bytes)?;
        }
        tx.commit()?;

        Ok(())
    }

    pub fn cast_record(&self, address: &str) -> Result<Option<CastRecord>, LedgerError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(SPELL_ADDRESSES)?;

        match table.get(address)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes.value())?)),
            None => Ok(None),
        }
    }

    /// Every address record, for the maintenance CLI.
    pub fn list_casts(&self) -> Result<Vec<(String, CastRecord)>, LedgerError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(SPELL_ADDRESSES)?;

        let mut casts = Vec::new();
        for entry in table.iter()? {
            let (address, bytes) = entry?;
            casts.push((
                address.value().to_string(),
                serde_json::from_slice(&bytes.value())?,
            ));
        }

        Ok(casts)
    }

    /// Administrative removal of an address record. Returns whether a
    /// record existed. Does not touch grants: identities that already
    /// earned access keep it.
    pub fn erase_cast(&self, address: &str) -> Result<bool, LedgerError> {
        let tx = self.db.begin_write()?;
        let existed;
        {
            let mut table = tx.open_table(SPELL_ADDRESSES)?;
            existed = table.remove(address)?.is_some();
        }
        tx.commit()?;

        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn temp_ledger(dir: &TempDir) -> Ledger {
        Ledger::open(dir.path().join("ledger.redb")).expect("failed to open ledger")
    }

    #[test]
    fn granted_defaults_for_unknown_identity() {
        let dir = TempDir::new().unwrap();
        let ledger = temp_ledger(&dir);

        assert!(!ledger.granted("nobody", false).unwrap());
        assert!(ledger.granted("nobody", true).unwrap());
    }

    #[test]
    fn set_granted_is_an_idempotent_upsert() {
        let dir = TempDir::new().unwrap();
        let ledger = temp_ledger(&dir);

        ledger.set_granted("u1", true).unwrap();
        ledger.set_granted("u1", true).unwrap();
        assert!(ledger.granted("u1", false).unwrap());

        ledger.set_granted("u1", false).unwrap();
        assert!(!ledger.granted("u1", true).unwrap());
    }

    #[test]
    fn grants_survive_reopening_the_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");

        {
            let ledger = Ledger::open(&path).unwrap();
            ledger.set_granted("u1", true).unwrap();
        }

        let reopened = Ledger::open(&path).unwrap();
        assert!(reopened.granted("u1", false).unwrap());
    }

    #[test]
    fn cast_records_survive_reopening_the_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.redb");

        let record = CastRecord {
            identity: "u1".to_string(),
            cast_time: Utc::now(),
        };

        {
            let ledger = Ledger::open(&path).unwrap();
            ledger.record_cast("1.2.3.4", &record).unwrap();
        }

        let reopened = Ledger::open(&path).unwrap();
        assert!(reopened.address_used("1.2.3.4").unwrap());
        assert_eq!(reopened.cast_record("1.2.3.4").unwrap(), Some(record));
    }

    #[test]
    fn unknown_address_is_not_used() {
        let dir = TempDir::new().unwrap();
        let ledger = temp_ledger(&dir);

        assert!(!ledger.address_used("5.6.7.8").unwrap());
        assert_eq!(ledger.cast_record("5.6.7.8").unwrap(), None);
    }

    #[test]
    fn list_casts_returns_every_record() {
        let dir = TempDir::new().unwrap();
        let ledger = temp_ledger(&dir);

        for (address, identity) in [("1.1.1.1", "a"), ("2.2.2.2", "b")] {
            ledger
                .record_cast(
                    address,
                    &CastRecord {
                        identity: identity.to_string(),
                        cast_time: Utc::now(),
                    },
                )
                .unwrap();
        }

        let mut casts = ledger.list_casts().unwrap();
        casts.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(casts.len(), 2);
        assert_eq!(casts[0].0, "1.1.1.1");
        assert_eq!(casts[0].1.identity, "a");
        assert_eq!(casts[1].0, "2.2.2.2");
    }

    #[test]
    fn erase_cast_removes_the_record_but_not_grants() {
        let dir = TempDir::new().unwrap();
        let ledger = temp_ledger(&dir);

        ledger.set_granted("u1", true).unwrap();
        ledger
            .record_cast(
                "1.2.3.4",
                &CastRecord {
                    identity: "u1".to_string(),
                    cast_time: Utc::now(),
                },
            )
            .unwrap();

        assert!(ledger.erase_cast("1.2.3.4").unwrap());
        assert!(!ledger.erase_cast("1.2.3.4").unwrap());
        assert!(!ledger.address_used("1.2.3.4").unwrap());
        assert!(ledger.granted("u1", false).unwrap());
    }
}
