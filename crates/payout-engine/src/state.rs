use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Stage;

/// Lifecycle of a payout window
///
/// Pending -> InProgress -> Completed is the only success path.
/// A window never goes back to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl WindowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowStatus::Pending => "pending",
            WindowStatus::InProgress => "in_progress",
            WindowStatus::Completed => "completed",
            WindowStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(WindowStatus::Pending),
            "in_progress" => Some(WindowStatus::InProgress),
            "completed" => Some(WindowStatus::Completed),
            "failed" => Some(WindowStatus::Failed),
            _ => None,
        }
    }

    /// Whether `self -> next` is a legal status change
    pub fn can_transition_to(&self, next: WindowStatus) -> bool {
        matches!(
            (self, next),
            (WindowStatus::Pending, WindowStatus::InProgress)
                | (WindowStatus::InProgress, WindowStatus::Completed)
                | (WindowStatus::InProgress, WindowStatus::Failed)
        )
    }
}

/// Chain a window pays out on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "testnet" | "test" | "sepolia" => Some(Network::Testnet),
            "mainnet" | "production" | "prod" => Some(Network::Mainnet),
            _ => None,
        }
    }
}

/// One distribution cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutWindow {
    pub id: Uuid,
    pub status: WindowStatus,
    pub created_at: DateTime<Utc>,
}

/// Execution parameters of a window (1:1, immutable once created)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConditions {
    pub window_id: Uuid,
    /// Decimal string in stablecoin units, e.g. "10.00"
    pub total_amount: String,
    pub scheduled_at: DateTime<Utc>,
    pub network: Network,
    pub max_participants: u32,
    /// Bypasses the scheduled time check
    pub execute_immediately: bool,
}

impl PayoutConditions {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execute_immediately || self.scheduled_at <= now
    }
}

/// Conditions for a window that does not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayoutConditions {
    pub total_amount: String,
    pub scheduled_at: DateTime<Utc>,
    pub network: Network,
    pub max_participants: u32,
    pub execute_immediately: bool,
}

impl NewPayoutConditions {
    pub fn into_conditions(self, window_id: Uuid) -> PayoutConditions {
        PayoutConditions {
            window_id,
            total_amount: self.total_amount,
            scheduled_at: self.scheduled_at,
            network: self.network,
            max_participants: self.max_participants,
            execute_immediately: self.execute_immediately,
        }
    }
}

/// Registered payout address for a window (read-only snapshot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub window_id: Uuid,
    pub address: Address,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Sent,
    Confirmed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Sent => "sent",
            TransferStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(TransferStatus::Sent),
            "confirmed" => Some(TransferStatus::Confirmed),
            _ => None,
        }
    }
}

/// Ledger row for one on-chain transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub window_id: Uuid,
    pub tx_hash: H256,
    pub recipient: Address,
    /// Smallest token units; `None` when the amount could not be recorded
    pub amount_units: Option<u64>,
    pub status: TransferStatus,
    pub gas_cost_wei: Option<U256>,
    pub chain_id: u64,
    pub block_number: Option<u64>,
    pub explorer_url: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Written by the fallback path after the primary insert failed
    pub degraded: bool,
}

/// Seed values for future windows, maintained by admin tooling
///
/// Every field is optional so that missing values can fall back
/// field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPayoutConfig {
    pub amount: Option<String>,
    pub max_participants: Option<u32>,
    pub network: Option<Network>,
    /// 0 = Sunday ... 6 = Saturday
    pub weekday: Option<i32>,
    /// "HH:MM"
    pub time: Option<String>,
    /// IANA timezone name
    pub timezone: Option<String>,
}

impl DefaultPayoutConfig {
    /// Field-wise `self.or(fallback)`
    pub fn or(self, fallback: DefaultPayoutConfig) -> DefaultPayoutConfig {
        DefaultPayoutConfig {
            amount: self.amount.or(fallback.amount),
            max_participants: self.max_participants.or(fallback.max_participants),
            network: self.network.or(fallback.network),
            weekday: self.weekday.or(fallback.weekday),
            time: self.time.or(fallback.time),
            timezone: self.timezone.or(fallback.timezone),
        }
    }
}

/// Append-only audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub message: String,
    pub stage: Option<Stage>,
    pub window_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub is_failure: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn conditions(scheduled_at: DateTime<Utc>, execute_immediately: bool) -> PayoutConditions {
        PayoutConditions {
            window_id: Uuid::new_v4(),
            total_amount: "10.00".to_string(),
            scheduled_at,
            network: Network::Testnet,
            max_participants: 10,
            execute_immediately,
        }
    }

    #[test]
    fn due_when_scheduled_time_reached() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap();
        assert!(conditions(now, false).is_due(now));
        assert!(conditions(now - Duration::minutes(1), false).is_due(now));
        assert!(!conditions(now + Duration::minutes(1), false).is_due(now));
    }

    #[test]
    fn execute_immediately_overrides_schedule() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap();
        assert!(conditions(now + Duration::days(3), true).is_due(now));
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use WindowStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!InProgress.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn status_round_trips_through_db_text() {
        for status in [
            WindowStatus::Pending,
            WindowStatus::InProgress,
            WindowStatus::Completed,
            WindowStatus::Failed,
        ] {
            assert_eq!(WindowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WindowStatus::parse("done"), None);
    }

    #[test]
    fn network_accepts_aliases() {
        assert_eq!(Network::parse("TESTNET"), Some(Network::Testnet));
        assert_eq!(Network::parse(" production "), Some(Network::Mainnet));
        assert_eq!(Network::parse("devnet"), None);
    }

    #[test]
    fn default_config_falls_back_per_field() {
        let primary = DefaultPayoutConfig {
            amount: Some("25.00".into()),
            weekday: Some(3),
            ..Default::default()
        };
        let fallback = DefaultPayoutConfig {
            amount: Some("10.00".into()),
            max_participants: Some(50),
            timezone: Some("Europe/Berlin".into()),
            ..Default::default()
        };
        let merged = primary.or(fallback);
        assert_eq!(merged.amount.as_deref(), Some("25.00"));
        assert_eq!(merged.max_participants, Some(50));
        assert_eq!(merged.weekday, Some(3));
        assert_eq!(merged.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(merged.time, None);
    }
}
