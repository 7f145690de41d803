//! Durable store backed by SQLite.

use super::{LedgerMeta, LedgerStore};
use crate::error::{StoreError, StoreResult};
use blindfilter_types::{
    Ciphertext, ClientId, ClientSyncState, Rule, RuleFields, RuleId, Timestamp,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RULE_COLUMNS: &str = "id, domain_pattern, path_pattern, rule_type, changed_at";

/// Persistent ledger store backed by a single SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rules (
                id INTEGER PRIMARY KEY,
                domain_pattern BLOB NOT NULL,
                path_pattern BLOB NOT NULL,
                rule_type BLOB NOT NULL,
                changed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS client_sync (
                client_id TEXT PRIMARY KEY,
                last_synced_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ledger_meta (
                singleton INTEGER PRIMARY KEY CHECK (singleton = 0),
                rule_count INTEGER NOT NULL,
                last_update INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO ledger_meta (singleton, rule_count, last_update) VALUES (0, 0, 0);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

// SQLite integers are signed 64-bit. Values past `i64::MAX` are refused
// rather than stored negative.
fn to_sql(value: u64, what: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| {
        StoreError::OutOfRange(format!("{what} {value} exceeds the SQLite integer range"))
    })
}

fn write_meta(conn: &Connection, meta: LedgerMeta) -> StoreResult<()> {
    let rule_count = to_sql(meta.rule_count, "rule count")?;
    let last_update = to_sql(meta.last_update.as_millis(), "timestamp")?;
    conn.execute(
        "UPDATE ledger_meta SET rule_count = ?1, last_update = ?2 WHERE singleton = 0",
        params![rule_count, last_update],
    )?;
    Ok(())
}

fn rule_params(rule: &Rule) -> StoreResult<(i64, i64)> {
    Ok((
        to_sql(rule.id.get(), "rule id")?,
        to_sql(rule.changed_at.as_millis(), "timestamp")?,
    ))
}

// Raw row contents, decoded outside the rusqlite closure so decode
// failures surface as `StoreError::Corrupt`.
type RawRule = (i64, Vec<u8>, Vec<u8>, Vec<u8>, i64);

fn read_raw_rule(row: &Row<'_>) -> rusqlite::Result<RawRule> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode_rule((id, domain, path, rule_type, changed_at): RawRule) -> StoreResult<Rule> {
    let id = u64::try_from(id)
        .ok()
        .and_then(RuleId::new)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid rule id {id}")))?;
    let changed_at = u64::try_from(changed_at)
        .map_err(|_| StoreError::Corrupt(format!("negative timestamp on rule {id}")))?;
    Ok(Rule {
        id,
        fields: RuleFields::new(
            Ciphertext::from_bytes(domain),
            Ciphertext::from_bytes(path),
            Ciphertext::from_bytes(rule_type),
        ),
        changed_at: Timestamp::from_millis(changed_at),
    })
}

fn query_rules(conn: &Connection, sql: &str, after: Option<Timestamp>) -> StoreResult<Vec<Rule>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match after {
        // Nothing stored can be later than a cursor beyond the range.
        Some(ts) => match i64::try_from(ts.as_millis()) {
            Ok(after) => stmt
                .query_map(params![after], read_raw_rule)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            Err(_) => Vec::new(),
        },
        None => stmt
            .query_map([], read_raw_rule)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    rows.into_iter().map(decode_rule).collect()
}

impl LedgerStore for SqliteStore {
    fn load_meta(&self) -> StoreResult<LedgerMeta> {
        let conn = self.conn()?;
        let (count, last): (i64, i64) = conn.query_row(
            "SELECT rule_count, last_update FROM ledger_meta WHERE singleton = 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LedgerMeta {
            rule_count: u64::try_from(count)
                .map_err(|_| StoreError::Corrupt(format!("negative rule count {count}")))?,
            last_update: Timestamp::from_millis(
                u64::try_from(last)
                    .map_err(|_| StoreError::Corrupt(format!("negative timestamp {last}")))?,
            ),
        })
    }

    fn insert_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<()> {
        let (id, changed_at) = rule_params(rule)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO rules (id, domain_pattern, path_pattern, rule_type, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                rule.fields.domain_pattern.as_bytes(),
                rule.fields.path_pattern.as_bytes(),
                rule.fields.rule_type.as_bytes(),
                changed_at,
            ],
        )?;
        write_meta(&tx, meta)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_rule(&self, rule: &Rule, meta: LedgerMeta) -> StoreResult<bool> {
        let (id, changed_at) = rule_params(rule)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE rules SET domain_pattern = ?2, path_pattern = ?3, rule_type = ?4, changed_at = ?5
             WHERE id = ?1",
            params![
                id,
                rule.fields.domain_pattern.as_bytes(),
                rule.fields.path_pattern.as_bytes(),
                rule.fields.rule_type.as_bytes(),
                changed_at,
            ],
        )?;
        if changed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }
        write_meta(&tx, meta)?;
        tx.commit()?;
        Ok(true)
    }

    fn get_rule(&self, id: RuleId) -> StoreResult<Option<Rule>> {
        let Ok(id) = i64::try_from(id.get()) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM rules WHERE id = ?1"),
                params![id],
                read_raw_rule,
            )
            .optional()?;
        raw.map(decode_rule).transpose()
    }

    fn rules(&self) -> StoreResult<Vec<Rule>> {
        let conn = self.conn()?;
        query_rules(
            &conn,
            &format!("SELECT {RULE_COLUMNS} FROM rules ORDER BY id ASC"),
            None,
        )
    }

    fn rules_changed_after(&self, after: Timestamp) -> StoreResult<Vec<Rule>> {
        let conn = self.conn()?;
        query_rules(
            &conn,
            &format!("SELECT {RULE_COLUMNS} FROM rules WHERE changed_at > ?1 ORDER BY id ASC"),
            Some(after),
        )
    }

    fn sync_state(&self, client_id: &ClientId) -> StoreResult<Option<ClientSyncState>> {
        let conn = self.conn()?;
        let last: Option<i64> = conn
            .query_row(
                "SELECT last_synced_at FROM client_sync WHERE client_id = ?1",
                params![client_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        last.map(|millis| -> StoreResult<ClientSyncState> {
            let millis = u64::try_from(millis).map_err(|_| {
                StoreError::Corrupt(format!("negative sync cursor for {client_id}"))
            })?;
            Ok(ClientSyncState {
                client_id: *client_id,
                last_synced_at: Timestamp::from_millis(millis),
            })
        })
        .transpose()
    }

    fn save_sync_state(&self, state: &ClientSyncState) -> StoreResult<()> {
        let last_synced_at = to_sql(state.last_synced_at.as_millis(), "sync cursor")?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO client_sync (client_id, last_synced_at) VALUES (?1, ?2)",
            params![state.client_id.to_string(), last_synced_at],
        )?;
        Ok(())
    }
}
