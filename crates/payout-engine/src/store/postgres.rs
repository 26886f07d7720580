use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, H256, U256};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{check_transition, LedgerStore};
use crate::{
    errors::StoreError,
    state::{
        AuditLogEntry, DefaultPayoutConfig, NewPayoutConditions, Network, Participant,
        PayoutConditions, PayoutWindow, TransferRecord, TransferStatus, WindowStatus,
    },
};

/// Postgres-backed ledger (schema in `migrations/`)
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }
}

fn invalid(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidData(format!("{what}: {err}"))
}

fn window_from_row(row: &PgRow) -> Result<PayoutWindow, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(PayoutWindow {
        id: row.try_get("id")?,
        status: WindowStatus::parse(&status).ok_or_else(|| invalid("window status", &status))?,
        created_at: row.try_get("created_at")?,
    })
}

fn conditions_from_row(row: &PgRow) -> Result<PayoutConditions, StoreError> {
    let network: String = row.try_get("network")?;
    let max_participants: i32 = row.try_get("max_participants")?;
    Ok(PayoutConditions {
        window_id: row.try_get("window_id")?,
        total_amount: row.try_get("total_amount")?,
        scheduled_at: row.try_get("scheduled_at")?,
        network: Network::parse(&network).ok_or_else(|| invalid("network", &network))?,
        max_participants: u32::try_from(max_participants)
            .map_err(|err| invalid("max_participants", err))?,
        execute_immediately: row.try_get("execute_immediately")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRecord, StoreError> {
    let tx_hash: String = row.try_get("tx_hash")?;
    let recipient: String = row.try_get("recipient")?;
    let status: String = row.try_get("status")?;
    let amount_units: Option<i64> = row.try_get("amount_units")?;
    let gas_cost_wei: Option<String> = row.try_get("gas_cost_wei")?;
    let chain_id: i64 = row.try_get("chain_id")?;
    let block_number: Option<i64> = row.try_get("block_number")?;

    Ok(TransferRecord {
        id: row.try_get("id")?,
        window_id: row.try_get("window_id")?,
        tx_hash: H256::from_str(&tx_hash).map_err(|err| invalid("tx_hash", err))?,
        recipient: Address::from_str(&recipient).map_err(|err| invalid("recipient", err))?,
        amount_units: amount_units
            .map(u64::try_from)
            .transpose()
            .map_err(|err| invalid("amount_units", err))?,
        status: TransferStatus::parse(&status).ok_or_else(|| invalid("transfer status", &status))?,
        gas_cost_wei: gas_cost_wei
            .map(|raw| U256::from_dec_str(&raw))
            .transpose()
            .map_err(|err| invalid("gas_cost_wei", err))?,
        chain_id: u64::try_from(chain_id).map_err(|err| invalid("chain_id", err))?,
        block_number: block_number
            .map(u64::try_from)
            .transpose()
            .map_err(|err| invalid("block_number", err))?,
        explorer_url: row.try_get("explorer_url")?,
        confirmed_at: row.try_get("confirmed_at")?,
        degraded: row.try_get("degraded")?,
    })
}

const CONDITIONS_COLUMNS: &str = "c.window_id, c.total_amount, c.scheduled_at, c.network, \
     c.max_participants, c.execute_immediately";

#[async_trait]
impl LedgerStore for PgLedger {
    async fn windows_with_status(
        &self,
        status: WindowStatus,
    ) -> Result<Vec<(PayoutWindow, PayoutConditions)>, StoreError> {
        let sql = format!(
            "SELECT w.id, w.status, w.created_at, {CONDITIONS_COLUMNS} \
             FROM payout_windows w \
             JOIN payout_conditions c ON c.window_id = w.id \
             WHERE w.status = $1 \
             ORDER BY w.created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<_, StoreError> { Ok((window_from_row(row)?, conditions_from_row(row)?)) })
            .collect()
    }

    async fn transition_window(
        &self,
        window_id: Uuid,
        from: WindowStatus,
        to: WindowStatus,
    ) -> Result<u64, StoreError> {
        check_transition(from, to)?;
        let result = sqlx::query("UPDATE payout_windows SET status = $1 WHERE id = $2 AND status = $3")
            .bind(to.as_str())
            .bind(window_id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn participants(&self, window_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let rows = sqlx::query(
            "SELECT window_id, address, joined_at FROM payout_participants \
             WHERE window_id = $1 ORDER BY joined_at ASC, id ASC",
        )
        .bind(window_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Participant, StoreError> {
                let address: String = row.try_get("address")?;
                Ok(Participant {
                    window_id: row.try_get("window_id")?,
                    address: Address::from_str(&address).map_err(|err| invalid("address", err))?,
                    joined_at: row.try_get("joined_at")?,
                })
            })
            .collect()
    }

    async fn create_window(
        &self,
        conditions: NewPayoutConditions,
    ) -> Result<(PayoutWindow, PayoutConditions), StoreError> {
        let window = PayoutWindow {
            id: Uuid::new_v4(),
            status: WindowStatus::Pending,
            created_at: Utc::now(),
        };
        let conditions = conditions.into_conditions(window.id);
        let max_participants =
            i32::try_from(conditions.max_participants).map_err(|err| invalid("max_participants", err))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO payout_windows (id, status, created_at) VALUES ($1, $2, $3)")
            .bind(window.id)
            .bind(window.status.as_str())
            .bind(window.created_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO payout_conditions \
             (window_id, total_amount, scheduled_at, network, max_participants, execute_immediately) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(window.id)
        .bind(&conditions.total_amount)
        .bind(conditions.scheduled_at)
        .bind(conditions.network.as_str())
        .bind(max_participants)
        .bind(conditions.execute_immediately)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok((window, conditions))
    }

    async fn insert_transfer(&self, record: &TransferRecord) -> Result<(), StoreError> {
        let amount_units = record
            .amount_units
            .map(i64::try_from)
            .transpose()
            .map_err(|err| invalid("amount_units", err))?;
        let block_number = record
            .block_number
            .map(i64::try_from)
            .transpose()
            .map_err(|err| invalid("block_number", err))?;
        let chain_id = i64::try_from(record.chain_id).map_err(|err| invalid("chain_id", err))?;

        sqlx::query(
            "INSERT INTO payout_transactions \
             (id, window_id, tx_hash, recipient, amount_units, status, gas_cost_wei, chain_id, \
              block_number, explorer_url, confirmed_at, degraded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7::numeric, $8, $9, $10, $11, $12)",
        )
        .bind(record.id)
        .bind(record.window_id)
        .bind(format!("{:#x}", record.tx_hash))
        .bind(format!("{:#x}", record.recipient))
        .bind(amount_units)
        .bind(record.status.as_str())
        .bind(record.gas_cost_wei.map(|gas| gas.to_string()))
        .bind(chain_id)
        .bind(block_number)
        .bind(&record.explorer_url)
        .bind(record.confirmed_at)
        .bind(record.degraded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transfers(&self, window_id: Uuid) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, window_id, tx_hash, recipient, amount_units, status, \
             gas_cost_wei::text AS gas_cost_wei, chain_id, block_number, explorer_url, \
             confirmed_at, degraded \
             FROM payout_transactions WHERE window_id = $1 ORDER BY confirmed_at ASC NULLS LAST",
        )
        .bind(window_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transfer_from_row).collect()
    }

    async fn default_config(&self) -> Result<Option<DefaultPayoutConfig>, StoreError> {
        let row = sqlx::query(
            "SELECT amount, max_participants, network, weekday, time_of_day, timezone \
             FROM payout_default_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let max_participants: Option<i32> = row.try_get("max_participants")?;
        let network: Option<String> = row.try_get("network")?;
        Ok(Some(DefaultPayoutConfig {
            amount: row.try_get("amount")?,
            // Out-of-range values are treated as unset and fall back
            max_participants: max_participants.and_then(|value| u32::try_from(value).ok()),
            network: network.as_deref().and_then(Network::parse),
            weekday: row.try_get("weekday")?,
            time: row.try_get("time_of_day")?,
            timezone: row.try_get("timezone")?,
        }))
    }

    async fn append_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payout_logs (id, message, stage, window_id, details, is_failure, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(&entry.message)
        .bind(entry.stage.map(|stage| stage.as_str()))
        .bind(entry.window_id)
        .bind(&entry.details)
        .bind(entry.is_failure)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
