use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use rand::Rng;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::api::{ApiError, FaucetApi, HttpTransport, RetryPolicy};
use crate::config::Validate;
use crate::unlock::{DIRECT_CLAIM_TIER, GameDriver, UnlockEngine, rounds_required};

use super::clock::CooldownClock;
use super::config::SessionConfig;
use super::session_log::{LogEntry, SessionLog};
use super::state::SessionState;
use super::stats::SessionStats;
use super::strategy::all_in_plan;

const POLL_TICK: Duration = Duration::from_secs(1);

struct SessionControls {
    running: AtomicBool,
    paused: AtomicBool,
    cashout_requested: AtomicBool,
}

struct SharedView {
    state: Mutex<SessionState>,
    stats: Mutex<SessionStats>,
    cashout_clock: Mutex<CooldownClock>,
}

/// Thread-safe window into a running session. Getters return snapshots;
/// control methods only flip flags the worker polls, so they are safe to
/// call from any thread at any time.
pub struct SessionHandle {
    label: String,
    controls: Arc<SessionControls>,
    view: Arc<SharedView>,
    log: SessionLog,
    log_receiver: Option<UnboundedReceiver<LogEntry>>,
}

impl SessionHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SessionState {
        *self.view.state.lock().unwrap()
    }

    pub fn stats(&self) -> SessionStats {
        self.view.stats.lock().unwrap().clone()
    }

    pub fn cashout_countdown(&self) -> Duration {
        self.view.cashout_clock.lock().unwrap().remaining()
    }

    pub fn is_running(&self) -> bool {
        self.controls.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.controls.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        if !self.controls.paused.swap(true, Ordering::SeqCst) {
            self.log.push("Paused by operator");
        }
    }

    pub fn resume(&self) {
        if self.controls.paused.swap(false, Ordering::SeqCst) {
            self.log.push("Resumed by operator");
        }
    }

    pub fn stop(&self) {
        if self.controls.running.swap(false, Ordering::SeqCst) {
            *self.view.state.lock().unwrap() = SessionState::Stopped;
            self.log.push("Stop requested");
        }
    }

    pub fn cashout_now(&self) -> Result<(), String> {
        let state = self.state();
        if !matches!(state, SessionState::Farming | SessionState::CashoutWait) {
            return Err(format!("cash out is not available while {}", state));
        }
        self.controls.cashout_requested.store(true, Ordering::SeqCst);
        self.log.push("Manual cash out requested");
        Ok(())
    }

    pub fn take_log_receiver(&mut self) -> Option<UnboundedReceiver<LogEntry>> {
        self.log_receiver.take()
    }
}

/// Worker owning one account's claim/bet/cashout cycle. Everything mutable
/// lives on this single logical flow; the handle only observes snapshots
/// and flips flags.
pub struct FaucetSession<T: HttpTransport, D: GameDriver> {
    config: SessionConfig,
    api: FaucetApi<T>,
    unlock: UnlockEngine<D>,
    controls: Arc<SessionControls>,
    view: Arc<SharedView>,
    claim_clock: CooldownClock,
    log: SessionLog,
}

impl<T: HttpTransport, D: GameDriver + Sync> FaucetSession<T, D> {
    /// Validates the configuration up front; a bad parameter fails here,
    /// never mid-loop.
    pub fn new(
        config: SessionConfig,
        transport: T,
        driver: D,
    ) -> Result<(Self, SessionHandle), String> {
        config.validate()?;

        let (log, log_receiver) = SessionLog::new();
        let api = FaucetApi::new(
            transport,
            &config.base_url,
            &config.identity.api_key,
            log.clone(),
        );
        let unlock = UnlockEngine::new(driver, log.clone());

        let controls = Arc::new(SessionControls {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            cashout_requested: AtomicBool::new(false),
        });
        let view = Arc::new(SharedView {
            state: Mutex::new(SessionState::Farming),
            stats: Mutex::new(SessionStats::default()),
            cashout_clock: Mutex::new(CooldownClock::default()),
        });

        let handle = SessionHandle {
            label: config.label.clone(),
            controls: controls.clone(),
            view: view.clone(),
            log: log.clone(),
            log_receiver: Some(log_receiver),
        };

        let session = Self {
            config,
            api,
            unlock,
            controls,
            view,
            claim_clock: CooldownClock::default(),
            log,
        };
        Ok((session, handle))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.api.set_retry_policy(policy);
        self
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        self.log.push(format!(
            "Session started: currency {}, target {:.8}, strategy all-in",
            self.config.currency, self.config.target_amount
        ));
        self.view.stats.lock().unwrap().session_start = Some(Local::now());

        match self.api.get_balance(&self.config.currency, true).await {
            Ok(balance) => {
                let mut stats = self.view.stats.lock().unwrap();
                stats.starting_balance = balance.faucet;
                stats.current_balance = balance.faucet;
            }
            Err(error) => self.handle_api_error(error).await,
        }

        while self.running() {
            if self.paused() {
                tokio::time::sleep(POLL_TICK).await;
                continue;
            }

            let step = match self.state() {
                SessionState::Farming => self.farm_tick().await,
                SessionState::CashoutWait => self.cashout_wait_tick().await,
                SessionState::PostCashout => {
                    self.post_cashout_tick();
                    Ok(())
                }
                SessionState::Stopped => break,
            };

            if let Err(error) = step {
                self.handle_api_error(error).await;
            }
        }

        let stats = self.view.stats.lock().unwrap().clone();
        for line in stats.summary_lines() {
            self.log.push(line);
        }
        self.log.push(format!("Session finished in state {}", self.state()));
    }

    /// Only an expired credential terminates the session; rate limits and
    /// transport failures back off and retry the same step. The state is
    /// deliberately left untouched on a fatal stop so it stays visible for
    /// diagnostics.
    async fn handle_api_error(&self, error: ApiError) {
        match error {
            ApiError::SessionExpired => {
                self.log.push(
                    "Session credentials rejected; stopping. Refresh the cookie and API key, \
                     then restart the session.",
                );
                self.controls.running.store(false, Ordering::SeqCst);
            }
            ApiError::RateLimited { .. } => {
                let pause = self.config.timing.rate_limit_pause_secs;
                self.log.push(format!("{}; pausing {}s before retrying", error, pause));
                self.wait_secs(pause).await;
            }
            ApiError::Transport(_) => {
                let delay = self.config.timing.retry_delay_secs;
                self.log.push(format!("{}; retrying in {}s", error, delay));
                self.wait_secs(delay).await;
            }
        }
    }

    async fn farm_tick(&mut self) -> Result<(), ApiError> {
        let balance = self.api.get_balance(&self.config.currency, false).await?;
        self.update_balance(balance.faucet);

        if self.take_cashout_request() {
            if balance.faucet > 0.0 {
                if self.attempt_cashout(balance.faucet).await? {
                    self.set_state(SessionState::PostCashout);
                }
                return Ok(());
            }
            self.log.push("Manual cash out ignored: faucet balance is empty");
        }

        if balance.faucet >= self.config.effective_cashout_threshold() {
            return self.target_reached(balance.faucet).await;
        }

        let min_bet = self.api.get_minimum_bet(&self.config.currency).await?;
        if balance.faucet < min_bet {
            return self.claim_tick(balance.faucet).await;
        }

        self.bet_tick(balance.faucet).await
    }

    async fn target_reached(&mut self, balance: f64) -> Result<(), ApiError> {
        self.log.push(format!(
            "Target reached: {:.8} {}",
            balance, self.config.currency
        ));

        if !self.config.auto_cashout {
            self.set_state(SessionState::Stopped);
            return Ok(());
        }

        let remaining = self.cashout_remaining();
        if !remaining.is_zero() {
            self.log.push(format!(
                "Transfer locked for another {}s",
                remaining.as_secs()
            ));
            self.set_state(SessionState::CashoutWait);
            return Ok(());
        }

        if self.attempt_cashout(balance).await? {
            self.set_state(SessionState::PostCashout);
        } else {
            self.set_state(SessionState::CashoutWait);
        }
        Ok(())
    }

    async fn cashout_wait_tick(&mut self) -> Result<(), ApiError> {
        let manual = self.take_cashout_request();
        if !manual && !self.cashout_remaining().is_zero() {
            tokio::time::sleep(POLL_TICK).await;
            return Ok(());
        }

        let balance = self.api.get_balance(&self.config.currency, true).await?;
        self.update_balance(balance.faucet);

        if balance.faucet <= 0.0 {
            if manual {
                self.log.push("Manual cash out ignored: faucet balance is empty");
                return Ok(());
            }
            self.log
                .push("Faucet balance was spent while waiting for the transfer lock");
            self.set_state(SessionState::PostCashout);
            return Ok(());
        }

        if self.attempt_cashout(balance.faucet).await? {
            self.set_state(SessionState::PostCashout);
        }
        Ok(())
    }

    fn post_cashout_tick(&self) {
        if self.config.continue_after_cashout {
            self.view.stats.lock().unwrap().cycles_completed += 1;
            self.log.push("Starting the next farming cycle");
            self.set_state(SessionState::Farming);
        } else {
            self.set_state(SessionState::Stopped);
        }
    }

    async fn claim_tick(&mut self, balance_before: f64) -> Result<(), ApiError> {
        let cooldown = self.claim_clock.remaining();
        if !cooldown.is_zero() {
            self.log.push(format!(
                "Balance too low to bet ({:.8} {}), claim cooldown active",
                balance_before, self.config.currency
            ));
            if !self.wait_with_countdown(cooldown, "Claim cooldown").await {
                return Ok(());
            }
        }
        if !self.running() {
            return Ok(());
        }

        let tier = self.api.get_unlock_tier(false).await?;
        let claimed = if tier >= DIRECT_CLAIM_TIER {
            self.log.push("Claiming faucet directly");
            self.api.claim_faucet(&self.config.currency).await?
        } else {
            let rounds = rounds_required(tier);
            self.log.push(format!(
                "Unlock tier {} requires {} mini-game rounds before claiming",
                tier, rounds
            ));
            self.unlock.unlock(rounds, &self.config.currency).await
        };

        if !claimed {
            self.log.push(format!(
                "Claim failed, retrying in {}s",
                self.config.timing.retry_delay_secs
            ));
            self.wait_secs(self.config.timing.retry_delay_secs).await;
            return Ok(());
        }

        self.claim_clock
            .start(Duration::from_secs(self.config.timing.claim_cooldown_secs));
        self.view.stats.lock().unwrap().claims_made += 1;
        self.log.push("Claim successful, waiting for the balance to sync");
        self.wait_secs(self.config.timing.claim_sync_secs).await;

        let after = self.api.get_balance(&self.config.currency, true).await?;
        self.update_balance(after.faucet);
        let credited = (after.faucet - balance_before).max(0.0);
        if credited > 0.0 {
            self.view.stats.lock().unwrap().total_claimed += credited;
        }
        Ok(())
    }

    async fn bet_tick(&mut self, balance: f64) -> Result<(), ApiError> {
        let threshold = self.config.effective_cashout_threshold();
        let Some(plan) = all_in_plan(balance, threshold, self.config.house_edge) else {
            return Ok(());
        };

        self.log.push(format!(
            "All-in bet: {:.8} {} at {:.2}% win chance ({:.2}x needed)",
            plan.amount, self.config.currency, plan.chance, plan.multiplier
        ));

        let result = self
            .api
            .place_wager(&self.config.currency, plan.amount, plan.chance, true)
            .await?;

        {
            let mut stats = self.view.stats.lock().unwrap();
            stats.total_bets += 1;
            if let Some(result) = &result {
                if result.win {
                    stats.total_wins += 1;
                } else {
                    stats.total_losses += 1;
                }
                stats.current_balance = result.faucet_balance;
            }
        }

        match result {
            Some(result) if result.win => self.log.push(format!(
                "Won! New faucet balance: {:.8} {}",
                result.faucet_balance, self.config.currency
            )),
            Some(result) => self.log.push(format!(
                "Lost. New faucet balance: {:.8} {}",
                result.faucet_balance, self.config.currency
            )),
            None => self.log.push("Bet was not accepted"),
        }

        self.wait_for(self.bet_pace()).await;
        Ok(())
    }

    async fn attempt_cashout(&mut self, amount: f64) -> Result<bool, ApiError> {
        self.log.push(format!(
            "Cashing out {:.8} {}",
            amount, self.config.currency
        ));
        let outcome = self.api.cash_out(&self.config.currency, amount).await?;

        if outcome.success {
            {
                let mut stats = self.view.stats.lock().unwrap();
                stats.cashouts_made += 1;
                stats.total_cashed_out += outcome.transferred_amount;
            }
            {
                let mut clock = self.view.cashout_clock.lock().unwrap();
                match outcome.cooldown_seconds {
                    Some(secs) => clock.start(Duration::from_secs(secs)),
                    None => clock.clear(),
                }
            }
            self.log.push(format!(
                "Cash out succeeded: {:.8} {} transferred",
                outcome.transferred_amount, self.config.currency
            ));
            return Ok(true);
        }

        // A refusal without a usable cooldown still backs off by the
        // configured hint; zero would spin against the transfer lock.
        let cooldown = outcome
            .cooldown_seconds
            .unwrap_or(self.config.timing.cashout_retry_hint_secs)
            .max(1);
        self.view
            .cashout_clock
            .lock()
            .unwrap()
            .start(Duration::from_secs(cooldown));

        let detail = if outcome.message.is_empty() {
            "no reason given".to_string()
        } else {
            outcome.message
        };
        self.log.push(format!(
            "Cash out refused ({}), next attempt in {}s",
            detail, cooldown
        ));
        Ok(false)
    }

    fn running(&self) -> bool {
        self.controls.running.load(Ordering::SeqCst)
    }

    fn paused(&self) -> bool {
        self.controls.paused.load(Ordering::SeqCst)
    }

    fn state(&self) -> SessionState {
        *self.view.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.view.state.lock().unwrap();
        if *state != next {
            self.log.push(format!("State changed: {} -> {}", state, next));
            *state = next;
        }
    }

    fn update_balance(&self, faucet: f64) {
        self.view.stats.lock().unwrap().current_balance = faucet;
    }

    fn cashout_remaining(&self) -> Duration {
        self.view.cashout_clock.lock().unwrap().remaining()
    }

    fn take_cashout_request(&self) -> bool {
        self.controls.cashout_requested.swap(false, Ordering::SeqCst)
    }

    fn bet_pace(&self) -> Duration {
        let min = self.config.timing.bet_pace_min_secs;
        let max = self.config.timing.bet_pace_max_secs;
        if max <= min {
            return Duration::from_secs(min);
        }
        Duration::from_secs(rand::rng().random_range(min..=max))
    }

    /// Sleeps up to `duration`, polling the control flags once per second.
    /// Pausing idles in place without running past the deadline. Returns
    /// false once a stop is requested.
    async fn wait_for(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.running() {
                return false;
            }
            if self.paused() {
                tokio::time::sleep(POLL_TICK).await;
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            tokio::time::sleep(remaining.min(POLL_TICK)).await;
        }
    }

    async fn wait_secs(&self, secs: u64) -> bool {
        self.wait_for(Duration::from_secs(secs)).await
    }

    async fn wait_with_countdown(&self, duration: Duration, label: &str) -> bool {
        let deadline = Instant::now() + duration;
        let mut last_logged = u64::MAX;
        loop {
            if !self.running() {
                return false;
            }
            if self.paused() {
                tokio::time::sleep(POLL_TICK).await;
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            let secs = remaining.as_secs();
            if secs % 10 == 0 && secs != last_logged && secs > 0 {
                self.log.push(format!("{}: {}s remaining", label, secs));
                last_logged = secs;
            }
            tokio::time::sleep(remaining.min(POLL_TICK)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::api::{HttpMethod, RawResponse};
    use crate::session::config::{AccountIdentity, TimingConfig};
    use crate::unlock::NoopDriver;

    struct ScriptState {
        responses: Mutex<VecDeque<Result<RawResponse, String>>>,
        calls: Mutex<Vec<(HttpMethod, String, Option<serde_json::Value>)>>,
    }

    #[derive(Clone)]
    struct ScriptedTransport {
        state: Arc<ScriptState>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<RawResponse, String>>) -> Self {
            Self {
                state: Arc::new(ScriptState {
                    responses: Mutex::new(responses.into()),
                    calls: Mutex::new(Vec::new()),
                }),
            }
        }

        fn call_count(&self) -> usize {
            self.state.calls.lock().unwrap().len()
        }

        fn call_body(&self, index: usize) -> serde_json::Value {
            self.state.calls.lock().unwrap()[index].2.clone().unwrap()
        }
    }

    impl HttpTransport for ScriptedTransport {
        async fn send(
            &self,
            method: HttpMethod,
            url: &str,
            body: Option<&serde_json::Value>,
        ) -> Result<RawResponse, String> {
            self.state
                .calls
                .lock()
                .unwrap()
                .push((method, url.to_string(), body.cloned()));
            self.state
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request to {}", url))
        }
    }

    fn ok(status: u16, body: &str) -> Result<RawResponse, String> {
        Ok(RawResponse {
            status,
            body: body.to_string(),
        })
    }

    fn user_info(faucet: &str) -> Result<RawResponse, String> {
        ok(
            200,
            &format!(
                r#"{{"balances": [{{"currency": "USDC", "main": "0", "faucet": "{}"}}], "pawLevel": 4}}"#,
                faucet
            ),
        )
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            label: "test".to_string(),
            identity: AccountIdentity {
                api_key: "key".to_string(),
                cookie: String::new(),
                fingerprint: String::new(),
            },
            base_url: "https://example.test".to_string(),
            proxy_url: None,
            currency: "USDC".to_string(),
            target_amount: 20.0,
            cashout_threshold: None,
            house_edge: 0.03,
            auto_cashout: false,
            continue_after_cashout: false,
            timing: TimingConfig {
                claim_cooldown_secs: 0,
                claim_sync_secs: 0,
                retry_delay_secs: 0,
                rate_limit_pause_secs: 0,
                cashout_retry_hint_secs: 60,
                bet_pace_min_secs: 0,
                bet_pace_max_secs: 0,
            },
        }
    }

    fn test_session(
        config: SessionConfig,
        responses: Vec<Result<RawResponse, String>>,
    ) -> (
        FaucetSession<ScriptedTransport, NoopDriver>,
        SessionHandle,
        ScriptedTransport,
    ) {
        let transport = ScriptedTransport::new(responses);
        let (session, handle) =
            FaucetSession::new(config, transport.clone(), NoopDriver).unwrap();
        let session = session.with_retry_policy(RetryPolicy::zero());
        (session, handle, transport)
    }

    #[test]
    fn test_invalid_config_is_rejected_before_start() {
        let mut config = test_config();
        config.target_amount = -1.0;
        let transport = ScriptedTransport::new(vec![]);
        assert!(FaucetSession::new(config, transport, NoopDriver).is_err());
    }

    #[tokio::test]
    async fn test_pause_and_resume_are_idempotent() {
        let (_session, handle, _) = test_session(test_config(), vec![]);

        assert!(!handle.is_paused());
        handle.pause();
        handle.pause();
        assert!(handle.is_paused());

        handle.resume();
        handle.resume();
        assert!(!handle.is_paused());
    }

    #[tokio::test]
    async fn test_cashout_now_rejected_outside_active_states() {
        let (_session, handle, _) = test_session(test_config(), vec![]);
        *handle.view.state.lock().unwrap() = SessionState::Stopped;
        assert!(handle.cashout_now().is_err());

        *handle.view.state.lock().unwrap() = SessionState::Farming;
        assert!(handle.cashout_now().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_farming_cycle_claims_bets_and_stops_at_target() {
        let responses = vec![
            // starting balance
            user_info("0"),
            // minimum bet lookup
            ok(200, r#"{"minBet": "0.001"}"#),
            // direct claim (tier 4)
            ok(200, "{}"),
            // post-claim sync read
            user_info("5"),
            // all-in wager at 24.25% loses
            ok(
                200,
                r#"{"data": {"win": false, "balance": {"faucet": "0", "main": "0"}}}"#,
            ),
            // next balance read is over the target
            user_info("20"),
        ];
        let (session, handle, transport) = test_session(test_config(), responses);

        tokio::spawn(session.run()).await.unwrap();

        assert_eq!(handle.state(), SessionState::Stopped);
        let stats = handle.stats();
        assert_eq!(stats.claims_made, 1);
        assert_eq!(stats.total_bets, 1);
        assert_eq!(stats.total_losses, 1);
        assert_eq!(stats.total_claimed, 5.0);
        assert_eq!(stats.starting_balance, 0.0);
        assert_eq!(stats.current_balance, 20.0);

        assert_eq!(transport.call_count(), 6);
        let wager = transport.call_body(4);
        assert_eq!(wager["chance"], "24.25");
        assert_eq!(wager["amount"], "5.00000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_cashout_waits_for_cooldown_then_transfers() {
        let mut config = test_config();
        config.auto_cashout = true;

        let responses = vec![
            user_info("20"),
            // first transfer attempt is refused with a 2s cooldown
            ok(400, r#"{"success": false, "cooldownSeconds": 2}"#),
            // balance re-read once the lock expires
            user_info("20"),
            ok(200, r#"{"success": true, "amount": "20"}"#),
        ];
        let (session, handle, transport) = test_session(config, responses);

        tokio::spawn(session.run()).await.unwrap();

        assert_eq!(handle.state(), SessionState::Stopped);
        let stats = handle.stats();
        assert_eq!(stats.cashouts_made, 1);
        assert_eq!(stats.total_cashed_out, 20.0);
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_after_cashout_starts_a_new_cycle() {
        let mut config = test_config();
        config.auto_cashout = true;
        config.continue_after_cashout = true;

        let responses = vec![
            user_info("20"),
            ok(200, r#"{"success": true, "amount": "20"}"#),
            // new cycle: the balance is empty again, so the claim path
            // starts over; an expired credential then ends the test
            user_info("0"),
            ok(200, r#"{"minBet": "0.001"}"#),
            ok(401, "session expired"),
        ];
        let (session, handle, transport) = test_session(config, responses);

        tokio::spawn(session.run()).await.unwrap();

        let stats = handle.stats();
        assert_eq!(stats.cashouts_made, 1);
        assert_eq!(stats.cycles_completed, 1);
        assert!(!handle.is_running());
        assert_eq!(transport.call_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credentials_stop_but_preserve_state() {
        let responses = vec![ok(401, "token EXPIRED")];
        let (session, handle, _) = test_session(test_config(), responses);

        tokio::spawn(session.run()).await.unwrap();

        assert!(!handle.is_running());
        // The state is left as-is for diagnostics.
        assert_eq!(handle.state(), SessionState::Farming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_cashout_from_farming() {
        let responses = vec![
            user_info("5"),
            ok(200, r#"{"success": true, "amount": "5"}"#),
        ];
        let (session, handle, transport) = test_session(test_config(), responses);
        handle.cashout_now().unwrap();

        tokio::spawn(session.run()).await.unwrap();

        assert_eq!(handle.state(), SessionState::Stopped);
        assert_eq!(handle.stats().cashouts_made, 1);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cashout_without_cooldown_uses_configured_hint() {
        let mut config = test_config();
        config.auto_cashout = true;

        // The transfer endpoint answers 429 until the retry budget is spent,
        // with no cooldown encoding anywhere in the responses.
        let mut responses = vec![user_info("20")];
        responses.extend((0..7).map(|_| ok(429, "")));
        let (session, handle, _) = test_session(config, responses);

        let join = tokio::spawn(session.run());
        while handle.state() != SessionState::CashoutWait {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let countdown = handle.cashout_countdown();
        assert!(countdown > Duration::from_secs(50));
        assert!(countdown <= Duration::from_secs(60));

        handle.stop();
        join.await.unwrap();
        assert_eq!(handle.state(), SessionState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_aborts_on_stop() {
        let (session, handle, _) = test_session(test_config(), vec![]);

        let controls = handle.controls.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            controls.running.store(false, Ordering::SeqCst);
        });

        assert!(!session.wait_for(Duration::from_secs(3600)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_suspends_while_paused() {
        let (session, handle, _) = test_session(test_config(), vec![]);
        handle.pause();

        let controls = handle.controls.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            controls.paused.store(false, Ordering::SeqCst);
        });

        // The deadline passes while paused; the wait only completes after
        // the resume.
        assert!(session.wait_for(Duration::from_secs(2)).await);
        assert!(!handle.is_paused());
    }
}
