use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::time::Instant;

use crate::session::SessionLog;

use super::error::ApiError;
use super::transport::{HttpMethod, HttpTransport, RawResponse};
use super::types::{
    Balance, CashoutOutcome, CashoutResponse, CurrencyInfoResponse, UserInfoResponse, WagerResponse,
    WagerResult, normalize_cooldown, parse_amount,
};

const USER_INFO_TTL: Duration = Duration::from_secs(60);

const SESSION_EXPIRED_MARKERS: [&str; 4] =
    ["expired", "invalid session", "unauthorized", "unauthenticated"];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_transport_attempts: u32,
    pub transport_backoff: Duration,
    pub transport_backoff_factor: f64,
    pub max_rate_limit_retries: u32,
    pub rate_limit_base_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transport_attempts: 5,
            transport_backoff: Duration::from_millis(1_500),
            transport_backoff_factor: 1.5,
            max_rate_limit_retries: 6,
            rate_limit_base_wait: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budgets with all delays collapsed to zero.
    pub fn zero() -> Self {
        Self {
            transport_backoff: Duration::ZERO,
            rate_limit_base_wait: Duration::ZERO,
            ..Self::default()
        }
    }

    fn transport_delay(&self, attempt: u32) -> Duration {
        self.transport_backoff
            .mul_f64(self.transport_backoff_factor.powi(attempt as i32))
    }

    fn rate_limit_delay(&self, retry: u32) -> Duration {
        self.rate_limit_base_wait * 2u32.saturating_pow(retry)
    }
}

#[derive(Debug, Clone)]
struct CachedUserInfo {
    balances: Vec<(String, Balance)>,
    unlock_tier: Option<u8>,
}

impl From<UserInfoResponse> for CachedUserInfo {
    fn from(response: UserInfoResponse) -> Self {
        let balances = response
            .balances
            .iter()
            .map(|entry| {
                (
                    entry.currency.to_uppercase(),
                    Balance {
                        main: parse_amount(&entry.main),
                        faucet: parse_amount(&entry.faucet),
                    },
                )
            })
            .collect();
        Self {
            balances,
            unlock_tier: response.paw_level,
        }
    }
}

struct UserInfoCacheEntry {
    fetched_at: Instant,
    info: CachedUserInfo,
}

/// Authenticated client for the faucet/wager/balance/transfer endpoints.
/// All calls share the same resiliency layering: transport retries beneath
/// rate-limit backoff, with authentication failures never retried.
pub struct FaucetApi<T: HttpTransport> {
    transport: T,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
    log: SessionLog,
    user_info_cache: Mutex<Option<UserInfoCacheEntry>>,
    min_bet_cache: Mutex<HashMap<String, f64>>,
    unlock_tier_cache: Mutex<Option<u8>>,
}

impl<T: HttpTransport> FaucetApi<T> {
    pub fn new(transport: T, base_url: &str, api_key: &str, log: SessionLog) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            policy: RetryPolicy::default(),
            log,
            user_info_cache: Mutex::new(None),
            min_bet_cache: Mutex::new(HashMap::new()),
            unlock_tier_cache: Mutex::new(None),
        }
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    fn endpoint_url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}/{}{}api_key={}", self.base_url, path, separator, self.api_key)
    }

    async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<RawResponse, ApiError> {
        let url = self.endpoint_url(path);
        let mut retry = 0u32;

        loop {
            let response = self.send_resilient(method, &url, body.as_ref()).await?;

            if response.status == 429 {
                if retry >= self.policy.max_rate_limit_retries {
                    return Err(ApiError::RateLimited {
                        endpoint: path.to_string(),
                        attempts: retry + 1,
                    });
                }
                let delay = self.policy.rate_limit_delay(retry);
                self.log.push(format!(
                    "Rate limited on {}, backing off {}s",
                    path,
                    delay.as_secs()
                ));
                tokio::time::sleep(delay).await;
                retry += 1;
                continue;
            }

            if is_session_expired(&response) {
                return Err(ApiError::SessionExpired);
            }

            return Ok(response);
        }
    }

    /// Transport-level retry: 5xx and connection failures back off and try
    /// again; the final 5xx response is handed back so callers treat it as
    /// an ordinary failed call.
    async fn send_resilient(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<RawResponse, ApiError> {
        let mut last_error = String::new();

        for attempt in 0..self.policy.max_transport_attempts {
            match self.transport.send(method, url, body).await {
                Ok(response) if response.status >= 500 => {
                    if attempt + 1 == self.policy.max_transport_attempts {
                        return Ok(response);
                    }
                    last_error = format!("HTTP {}", response.status);
                }
                Ok(response) => return Ok(response),
                Err(error) => {
                    if attempt + 1 == self.policy.max_transport_attempts {
                        return Err(ApiError::Transport(error));
                    }
                    last_error = error;
                }
            }

            let delay = self.policy.transport_delay(attempt);
            self.log.push(format!(
                "Request failed ({}), retrying in {:.1}s",
                last_error,
                delay.as_secs_f64()
            ));
            tokio::time::sleep(delay).await;
        }

        Err(ApiError::Transport(last_error))
    }

    fn invalidate_user_info(&self) {
        *self.user_info_cache.lock().unwrap() = None;
    }

    async fn user_info(&self, force: bool) -> Result<Option<CachedUserInfo>, ApiError> {
        {
            let cache = self.user_info_cache.lock().unwrap();
            if !force
                && let Some(entry) = cache.as_ref()
                && entry.fetched_at.elapsed() < USER_INFO_TTL
            {
                return Ok(Some(entry.info.clone()));
            }
        }

        let response = self.request(HttpMethod::Get, "api/bot/user-info", None).await?;
        if response.status != 200 {
            self.log
                .push(format!("User info request failed with HTTP {}", response.status));
            return Ok(None);
        }

        match serde_json::from_str::<UserInfoResponse>(&response.body) {
            Ok(parsed) => {
                let info = CachedUserInfo::from(parsed);
                *self.user_info_cache.lock().unwrap() = Some(UserInfoCacheEntry {
                    fetched_at: Instant::now(),
                    info: info.clone(),
                });
                Ok(Some(info))
            }
            Err(error) => {
                self.log.push(format!("User info response unreadable: {}", error));
                Ok(None)
            }
        }
    }

    /// Main and faucet balances for one currency. Unreadable responses
    /// yield zeros so the caller's loop keeps going.
    pub async fn get_balance(&self, currency: &str, force: bool) -> Result<Balance, ApiError> {
        let Some(info) = self.user_info(force).await? else {
            return Ok(Balance::default());
        };

        let symbol = currency.to_uppercase();
        Ok(info
            .balances
            .iter()
            .find(|(entry_currency, _)| *entry_currency == symbol)
            .map(|(_, balance)| *balance)
            .unwrap_or_default())
    }

    pub async fn get_unlock_tier(&self, force: bool) -> Result<u8, ApiError> {
        if !force && let Some(tier) = *self.unlock_tier_cache.lock().unwrap() {
            return Ok(tier);
        }

        let info = self.user_info(force).await?;
        let tier = match info.and_then(|info| info.unlock_tier) {
            Some(tier) => tier,
            None => {
                self.log.push("Unlock tier unavailable, assuming tier 0");
                0
            }
        };

        *self.unlock_tier_cache.lock().unwrap() = Some(tier);
        Ok(tier)
    }

    /// Smallest stake the remote side accepts for a currency. Successful
    /// lookups are cached; an unavailable endpoint falls back to a safe
    /// floor instead of blocking the session.
    pub async fn get_minimum_bet(&self, currency: &str) -> Result<f64, ApiError> {
        let symbol = currency.to_uppercase();
        if let Some(&min_bet) = self.min_bet_cache.lock().unwrap().get(&symbol) {
            return Ok(min_bet);
        }

        let path = format!("api/bot/currency-info?symbol={}", symbol);
        match self.request(HttpMethod::Get, &path, None).await {
            Ok(response) if response.status == 200 => {
                if let Ok(parsed) = serde_json::from_str::<CurrencyInfoResponse>(&response.body) {
                    let min_bet = parse_amount(&parsed.min_bet);
                    if min_bet > 0.0 {
                        self.min_bet_cache.lock().unwrap().insert(symbol, min_bet);
                        return Ok(min_bet);
                    }
                }
                self.log
                    .push("Minimum bet response unreadable, using safe floor");
                Ok(fallback_min_bet(&symbol))
            }
            Ok(response) => {
                self.log.push(format!(
                    "Minimum bet lookup failed with HTTP {}, using safe floor",
                    response.status
                ));
                Ok(fallback_min_bet(&symbol))
            }
            Err(ApiError::SessionExpired) => Err(ApiError::SessionExpired),
            Err(error) => {
                self.log
                    .push(format!("Minimum bet lookup failed ({}), using safe floor", error));
                Ok(fallback_min_bet(&symbol))
            }
        }
    }

    pub async fn claim_faucet(&self, currency: &str) -> Result<bool, ApiError> {
        let body = json!({ "symbol": currency.to_uppercase(), "results": [] });
        let response = self.request(HttpMethod::Post, "api/faucet", Some(body)).await?;
        self.invalidate_user_info();

        if response.status == 200 {
            Ok(true)
        } else {
            self.log
                .push(format!("Claim rejected with HTTP {}", response.status));
            Ok(false)
        }
    }

    pub async fn place_wager(
        &self,
        currency: &str,
        amount: f64,
        win_chance: f64,
        is_high: bool,
    ) -> Result<Option<WagerResult>, ApiError> {
        let body = json!({
            "symbol": currency.to_uppercase(),
            "amount": format!("{:.8}", amount),
            "chance": format!("{:.2}", win_chance),
            "isHigh": is_high,
            "faucet": true,
        });

        let response = self.request(HttpMethod::Post, "api/dice/play", Some(body)).await?;
        self.invalidate_user_info();

        if response.status != 200 {
            self.log
                .push(format!("Wager rejected with HTTP {}", response.status));
            return Ok(None);
        }

        match serde_json::from_str::<WagerResponse>(&response.body) {
            Ok(parsed) => Ok(Some(WagerResult {
                win: parsed.data.win,
                faucet_balance: parse_amount(&parsed.data.balance.faucet),
                main_balance: parse_amount(&parsed.data.balance.main),
            })),
            Err(error) => {
                self.log.push(format!("Wager response unreadable: {}", error));
                Ok(None)
            }
        }
    }

    /// Transfer from the faucet balance to the main balance. The response's
    /// cooldown is normalized whichever encoding the remote side chose; a
    /// response without one leaves `cooldown_seconds` unset so the session
    /// can apply its own hint.
    pub async fn cash_out(&self, currency: &str, amount: f64) -> Result<CashoutOutcome, ApiError> {
        let body = json!({
            "symbol": currency.to_uppercase(),
            "amount": format!("{:.8}", amount),
        });

        let response = match self
            .request(HttpMethod::Post, "api/faucet/cashout", Some(body))
            .await
        {
            Ok(response) => response,
            // The transfer endpoint enforces its own lock through 429; once
            // the retry budget is spent the attempt is reported as a plain
            // failure and the session falls back to its cooldown hint.
            Err(ApiError::RateLimited { endpoint, .. }) => {
                self.invalidate_user_info();
                return Ok(CashoutOutcome {
                    success: false,
                    transferred_amount: 0.0,
                    cooldown_seconds: None,
                    message: format!("rate limited on {}", endpoint),
                });
            }
            Err(error) => return Err(error),
        };
        self.invalidate_user_info();

        let parsed: CashoutResponse = serde_json::from_str(&response.body).unwrap_or_default();
        let success = response.status == 200 && parsed.success.unwrap_or(true);
        let transferred_amount = if success {
            let reported = parse_amount(&parsed.amount);
            if reported > 0.0 { reported } else { amount }
        } else {
            0.0
        };

        Ok(CashoutOutcome {
            success,
            transferred_amount,
            cooldown_seconds: normalize_cooldown(
                parsed.next_allowed_at,
                parsed.cooldown_seconds,
                Utc::now().timestamp(),
            ),
            message: parsed.message.unwrap_or_default(),
        })
    }
}

fn is_session_expired(response: &RawResponse) -> bool {
    if response.status != 401 && response.status != 403 {
        return false;
    }
    let body = response.body.to_lowercase();
    SESSION_EXPIRED_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}

fn fallback_min_bet(symbol: &str) -> f64 {
    match symbol {
        "USDC" | "USDT" => 0.001,
        "DOGE" | "TRX" => 0.1,
        _ => 0.000_000_01,
    }
}
