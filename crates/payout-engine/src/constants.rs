// Token precision
pub const TOKEN_DECIMALS: u32 = 6;            // USDC

// Hard defaults used when neither the default config nor the previous window supplies a value
pub const DEFAULT_PAYOUT_AMOUNT: &str = "10.00";
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 100;
pub const DEFAULT_WEEKDAY: u32 = 0;           // Sunday
pub const DEFAULT_HOUR: u32 = 18;
pub const DEFAULT_MINUTE: u32 = 0;
pub const DEFAULT_TIMEZONE: &str = "UTC";

// Chain defaults (Base mainnet / Base Sepolia)
pub const MAINNET_CHAIN_ID: u64 = 8453;
pub const TESTNET_CHAIN_ID: u64 = 84532;
pub const MAINNET_EXPLORER_URL: &str = "https://basescan.org";
pub const TESTNET_EXPLORER_URL: &str = "https://sepolia.basescan.org";

// Confirmations to wait for before a transfer counts as settled
pub const REQUIRED_CONFIRMATIONS: usize = 1;

// HTTP trigger
pub const TRIGGER_SECRET_HEADER: &str = "x-cron-secret";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
