pub const MIN_WIN_CHANCE: f64 = 0.01;
pub const MAX_WIN_CHANCE: f64 = 99.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetPlan {
    /// Entire current faucet balance; this strategy always goes all-in.
    pub amount: f64,
    pub multiplier: f64,
    pub raw_chance: f64,
    /// Win chance actually sent, rounded to two decimals and clamped to
    /// the accepted range.
    pub chance: f64,
}

/// Sizes a single all-in roll so that one win reaches the target from the
/// current balance, shaded by the house edge.
pub fn all_in_plan(balance: f64, target: f64, house_edge: f64) -> Option<BetPlan> {
    if balance <= 0.0 {
        return None;
    }

    let multiplier = target / balance;
    let raw_chance = 100.0 * (1.0 - house_edge) / multiplier;
    let chance = round_two_decimals(raw_chance).clamp(MIN_WIN_CHANCE, MAX_WIN_CHANCE);

    Some(BetPlan {
        amount: balance,
        multiplier,
        raw_chance,
        chance,
    })
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
