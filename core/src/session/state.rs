/// Lifecycle of one account session. Exactly one variant is active at a
/// time and `Stopped` is terminal. Wagers are only ever placed while
/// farming; the cashout-wait variant exists so a pending transfer lock can
/// never race a concurrent wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Farming,
    CashoutWait,
    PostCashout,
    Stopped,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Farming => "FARMING",
            SessionState::CashoutWait => "CASHOUT_WAIT",
            SessionState::PostCashout => "POST_CASHOUT",
            SessionState::Stopped => "STOPPED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
