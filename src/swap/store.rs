use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension as _, params};

use crate::error::StoreError;
use crate::swap::{Swap, SwapState, SwapType};

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Storage(format!("create store dir: {e}")))?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;

        migrate(&conn)?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&mut self, swap: &Swap) -> Result<(), StoreError> {
        self.conn
            .execute(
                r#"
INSERT INTO swaps (
  id,
  swap_type,
  state,
  peer_node_id,
  channel_id,
  amount_sat,
  taker_pubkey_hash,
  maker_pubkey_hash,
  payment_hash,
  payreq,
  cltv_expiry,
  opening_tx_id,
  claim_tx_id
) VALUES (
  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13
)
"#,
                params![
                    &swap.id,
                    swap_type_to_str(swap.swap_type),
                    state_to_str(swap.state),
                    &swap.peer_node_id,
                    &swap.channel_id,
                    swap.amount_sat,
                    swap.taker_pubkey_hash.as_deref(),
                    swap.maker_pubkey_hash.as_deref(),
                    swap.payment_hash.as_deref(),
                    swap.payreq.as_deref(),
                    swap.cltv_expiry,
                    swap.opening_tx_id.as_deref(),
                    swap.claim_tx_id.as_deref(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::Duplicate(swap.id.clone())
                }
                other => StoreError::from(other),
            })?;
        Ok(())
    }

    /// Full-record update in one statement; readers never observe a
    /// partially written record.
    pub fn update(&mut self, swap: &Swap) -> Result<(), StoreError> {
        let rows = self.conn.execute(
            r#"
UPDATE swaps
SET swap_type = ?2,
    state = ?3,
    peer_node_id = ?4,
    channel_id = ?5,
    amount_sat = ?6,
    taker_pubkey_hash = ?7,
    maker_pubkey_hash = ?8,
    payment_hash = ?9,
    payreq = ?10,
    cltv_expiry = ?11,
    opening_tx_id = ?12,
    claim_tx_id = ?13
WHERE id = ?1
"#,
            params![
                &swap.id,
                swap_type_to_str(swap.swap_type),
                state_to_str(swap.state),
                &swap.peer_node_id,
                &swap.channel_id,
                swap.amount_sat,
                swap.taker_pubkey_hash.as_deref(),
                swap.maker_pubkey_hash.as_deref(),
                swap.payment_hash.as_deref(),
                swap.payreq.as_deref(),
                swap.cltv_expiry,
                swap.opening_tx_id.as_deref(),
                swap.claim_tx_id.as_deref(),
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(swap.id.clone()));
        }
        Ok(())
    }

    pub fn delete_by_id(&mut self, id: &str) -> Result<(), StoreError> {
        let rows = self
            .conn
            .execute("DELETE FROM swaps WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: &str) -> Result<Swap, StoreError> {
        self.conn
            .query_row(
                r#"
SELECT
  id,
  swap_type,
  state,
  peer_node_id,
  channel_id,
  amount_sat,
  taker_pubkey_hash,
  maker_pubkey_hash,
  payment_hash,
  payreq,
  cltv_expiry,
  opening_tx_id,
  claim_tx_id
FROM swaps
WHERE id = ?1
"#,
                params![id],
                row_to_swap,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn list_all(&self) -> Result<Vec<Swap>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT
  id,
  swap_type,
  state,
  peer_node_id,
  channel_id,
  amount_sat,
  taker_pubkey_hash,
  maker_pubkey_hash,
  payment_hash,
  payreq,
  cltv_expiry,
  opening_tx_id,
  claim_tx_id
FROM swaps
ORDER BY id
"#,
        )?;

        let mut out = Vec::new();
        let rows = stmt.query_map([], row_to_swap)?;
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_swap(row: &rusqlite::Row<'_>) -> rusqlite::Result<Swap> {
    let swap_type_str: String = row.get(1)?;
    let state_str: String = row.get(2)?;
    let amount_sat: i64 = row.get(5)?;
    let cltv_expiry: Option<i64> = row.get(10)?;

    let cltv_expiry = cltv_expiry
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    10,
                    rusqlite::types::Type::Integer,
                    format!("invalid cltv_expiry {v}").into(),
                )
            })
        })
        .transpose()?;

    Ok(Swap {
        id: row.get(0)?,
        swap_type: swap_type_from_str(&swap_type_str, 1)?,
        state: state_from_str(&state_str, 2)?,
        peer_node_id: row.get(3)?,
        channel_id: row.get(4)?,
        amount_sat: u64::try_from(amount_sat).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Integer,
                format!("invalid amount_sat {amount_sat}").into(),
            )
        })?,
        taker_pubkey_hash: row.get(6)?,
        maker_pubkey_hash: row.get(7)?,
        payment_hash: row.get(8)?,
        payreq: row.get(9)?,
        cltv_expiry,
        opening_tx_id: row.get(11)?,
        claim_tx_id: row.get(12)?,
    })
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS swaps (
  id TEXT PRIMARY KEY,
  swap_type TEXT NOT NULL,
  state TEXT NOT NULL,
  peer_node_id TEXT NOT NULL,
  channel_id TEXT NOT NULL,
  amount_sat INTEGER NOT NULL,
  taker_pubkey_hash TEXT,
  maker_pubkey_hash TEXT,
  payment_hash TEXT,
  payreq TEXT,
  cltv_expiry INTEGER,
  opening_tx_id TEXT,
  claim_tx_id TEXT
);
CREATE INDEX IF NOT EXISTS swaps_state_idx ON swaps(state);
"#,
    )?;
    Ok(())
}

fn swap_type_to_str(swap_type: SwapType) -> &'static str {
    match swap_type {
        SwapType::SwapIn => "swap_in",
        SwapType::SwapOut => "swap_out",
    }
}

fn swap_type_from_str(s: &str, col: usize) -> rusqlite::Result<SwapType> {
    match s {
        "swap_in" => Ok(SwapType::SwapIn),
        "swap_out" => Ok(SwapType::SwapOut),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("unknown swap type: {other}").into(),
        )),
    }
}

fn state_to_str(state: SwapState) -> &'static str {
    match state {
        SwapState::Created => "created",
        SwapState::RequestSent => "request_sent",
        SwapState::RequestReceived => "request_received",
        SwapState::OpeningTxPrepared => "opening_tx_prepared",
        SwapState::OpeningTxBroadcasted => "opening_tx_broadcasted",
        SwapState::WaitingForTx => "waiting_for_tx",
        SwapState::ClaimedPreimage => "claimed_preimage",
        SwapState::RefundedTimeout => "refunded_timeout",
        SwapState::Aborted => "aborted",
    }
}

fn state_from_str(s: &str, col: usize) -> rusqlite::Result<SwapState> {
    match s {
        "created" => Ok(SwapState::Created),
        "request_sent" => Ok(SwapState::RequestSent),
        "request_received" => Ok(SwapState::RequestReceived),
        "opening_tx_prepared" => Ok(SwapState::OpeningTxPrepared),
        "opening_tx_broadcasted" => Ok(SwapState::OpeningTxBroadcasted),
        "waiting_for_tx" => Ok(SwapState::WaitingForTx),
        "claimed_preimage" => Ok(SwapState::ClaimedPreimage),
        "refunded_timeout" => Ok(SwapState::RefundedTimeout),
        "aborted" => Ok(SwapState::Aborted),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            col,
            rusqlite::types::Type::Text,
            format!("unknown swap state: {other}").into(),
        )),
    }
}
