use chrono::{DateTime, Local};

/// Running totals for one session. Only the session worker mutates these;
/// external observers receive value copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub session_start: Option<DateTime<Local>>,
    pub total_bets: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub claims_made: u64,
    pub cashouts_made: u64,
    pub cycles_completed: u64,
    pub starting_balance: f64,
    pub current_balance: f64,
    pub total_claimed: f64,
    pub total_cashed_out: f64,
}

impl SessionStats {
    pub fn win_rate(&self) -> f64 {
        if self.total_bets == 0 {
            return 0.0;
        }
        self.total_wins as f64 / self.total_bets as f64 * 100.0
    }

    pub fn profit(&self) -> f64 {
        self.current_balance + self.total_cashed_out - self.starting_balance
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec!["Session statistics".to_string()];
        if let Some(start) = self.session_start {
            let elapsed = Local::now().signed_duration_since(start);
            lines.push(format!(
                "Duration: {}m {}s",
                elapsed.num_minutes(),
                elapsed.num_seconds() % 60
            ));
        }
        lines.push(format!(
            "Bets: {} ({} won, {} lost, {:.2}% win rate)",
            self.total_bets,
            self.total_wins,
            self.total_losses,
            self.win_rate()
        ));
        lines.push(format!(
            "Claims: {} (total claimed {:.8})",
            self.claims_made, self.total_claimed
        ));
        lines.push(format!(
            "Cashouts: {} (total transferred {:.8})",
            self.cashouts_made, self.total_cashed_out
        ));
        lines.push(format!("Profit: {:+.8}", self.profit()));
        lines
    }
}
