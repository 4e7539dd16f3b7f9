use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Balance {
    pub main: f64,
    pub faucet: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WagerResult {
    pub win: bool,
    pub faucet_balance: f64,
    pub main_balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashoutOutcome {
    pub success: bool,
    pub transferred_amount: f64,
    /// Normalized cooldown before the next transfer is allowed. `None`
    /// means the response carried no recognizable cooldown encoding.
    pub cooldown_seconds: Option<u64>,
    pub message: String,
}

/// Amounts arrive either as JSON numbers or as decimal strings depending on
/// the endpoint; both map to a plain f64, anything else to zero.
pub(crate) fn parse_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default, rename = "pawLevel")]
    pub paw_level: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalanceEntry {
    pub currency: String,
    #[serde(default)]
    pub main: Value,
    #[serde(default)]
    pub faucet: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrencyInfoResponse {
    #[serde(default, rename = "minBet")]
    pub min_bet: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WagerResponse {
    pub data: WagerData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WagerData {
    #[serde(default)]
    pub win: bool,
    #[serde(default)]
    pub balance: WagerBalance,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct WagerBalance {
    #[serde(default)]
    pub main: Value,
    #[serde(default)]
    pub faucet: Value,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct CashoutResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default, rename = "nextAllowedAt")]
    pub next_allowed_at: Option<i64>,
    #[serde(default, rename = "cooldownSeconds")]
    pub cooldown_seconds: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Collapses the two cooldown encodings the transfer endpoint is known to
/// use (absolute next-allowed unix timestamp, or a duration in seconds)
/// into a single non-negative duration.
pub(crate) fn normalize_cooldown(
    next_allowed_at: Option<i64>,
    cooldown_seconds: Option<i64>,
    now_unix: i64,
) -> Option<u64> {
    if let Some(at) = next_allowed_at {
        return Some((at - now_unix).max(0) as u64);
    }
    cooldown_seconds.map(|secs| secs.max(0) as u64)
}
