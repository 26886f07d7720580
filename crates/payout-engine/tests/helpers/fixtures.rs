//! Seed data and config for tests

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ethers::types::Address;
use payout_engine::{
    config::Config,
    state::{Network, Participant, PayoutConditions, PayoutWindow, WindowStatus},
    store::MemoryLedger,
};
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-trigger-secret";
pub const TEST_TOKEN: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
pub const TEST_SIGNING_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

/// Wednesday 2024-06-05 12:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
}

pub fn test_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("PAYOUT_TRIGGER_SECRET", TEST_SECRET),
        ("TESTNET_RPC_URL", "http://127.0.0.1:8545"),
        ("TESTNET_PAYOUT_PRIVATE_KEY", TEST_SIGNING_KEY),
        ("TESTNET_USDC_ADDRESS", TEST_TOKEN),
    ]
}

/// Testnet fully configured, mainnet left empty
pub fn test_config() -> Config {
    test_config_with(&[])
}

pub fn test_config_with(extra: &[(&'static str, &'static str)]) -> Config {
    let vars: HashMap<&str, &str> = test_env().into_iter().chain(extra.iter().copied()).collect();
    Config::from_lookup(|key| vars.get(key).map(|value| value.to_string())).unwrap()
}

pub struct WindowSeed {
    pub status: WindowStatus,
    pub amount: &'static str,
    pub scheduled_at: DateTime<Utc>,
    pub network: Network,
    pub max_participants: u32,
    pub execute_immediately: bool,
    pub created_at: DateTime<Utc>,
}

impl Default for WindowSeed {
    fn default() -> Self {
        Self {
            status: WindowStatus::Pending,
            amount: "10.00",
            scheduled_at: now() - Duration::hours(1),
            network: Network::Testnet,
            max_participants: 100,
            execute_immediately: false,
            created_at: now() - Duration::days(7),
        }
    }
}

pub fn seed_window(ledger: &MemoryLedger, seed: WindowSeed) -> Uuid {
    let window = PayoutWindow {
        id: Uuid::new_v4(),
        status: seed.status,
        created_at: seed.created_at,
    };
    let conditions = PayoutConditions {
        window_id: window.id,
        total_amount: seed.amount.to_string(),
        scheduled_at: seed.scheduled_at,
        network: seed.network,
        max_participants: seed.max_participants,
        execute_immediately: seed.execute_immediately,
    };
    let id = window.id;
    ledger.insert_window(window, conditions).unwrap();
    id
}

/// Pending testnet window that became due an hour ago
pub fn seed_due_window(ledger: &MemoryLedger, amount: &'static str) -> Uuid {
    seed_window(
        ledger,
        WindowSeed {
            amount,
            ..WindowSeed::default()
        },
    )
}

pub fn participant_address(index: usize) -> Address {
    Address::from_low_u64_be(0xA000 + index as u64)
}

/// `count` participants joined one minute apart, returned in join order
pub fn seed_participants(ledger: &MemoryLedger, window_id: Uuid, count: usize) -> Vec<Address> {
    let start = now() - Duration::days(3);
    (0..count)
        .map(|i| {
            let address = participant_address(i);
            ledger
                .add_participant(Participant {
                    window_id,
                    address,
                    joined_at: start + Duration::minutes(i as i64),
                })
                .unwrap();
            address
        })
        .collect()
}

pub fn window_status(ledger: &MemoryLedger, window_id: Uuid) -> WindowStatus {
    ledger
        .all_windows()
        .unwrap()
        .into_iter()
        .find(|window| window.id == window_id)
        .map(|window| window.status)
        .unwrap()
}
