use serde::Serialize;

/// Whether the accumulation contribution keeps applying once the holder is
/// past retirement age.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ContributionPhase {
    #[default]
    StopAtRetirement,
    ContinueAfterRetirement,
}

/// How a liability balance evolves year over year.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LiabilityMode {
    /// A debt being paid down: interest accrues, the payment reduces the
    /// balance, and the balance is floored at zero once paid off.
    Amortizing { annual_payment: f64 },
    /// A growing real-terms expense bucket: interest accrues, the balance is
    /// deflated by inflation, and the year's expense is added. No floor.
    AccruedExpense { annual_expense: f64 },
}

#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub initial_balance: f64,
    /// Accumulation contribution per year, gated by retirement phase.
    pub annual_contribution: f64,
    /// Explicit withdrawal per year once past retirement age. Stated as a
    /// separate non-negative amount rather than a negative contribution.
    pub annual_drawdown: f64,
    /// Whole-number percentage: 4 means 4% per year.
    pub annual_rate_of_return: f64,
    pub contribution_phase: ContributionPhase,
}

#[derive(Debug, Clone)]
pub struct Liability {
    pub name: String,
    pub initial_balance: f64,
    /// Whole-number percentage: 5 means 5% per year.
    pub annual_interest_rate: f64,
    pub mode: LiabilityMode,
}

#[derive(Debug, Clone)]
pub struct ProjectionInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    /// Whole-number percentage. Deflates accrued-expense liabilities always,
    /// and account balances too when `real_terms` is set.
    pub inflation_rate: f64,
    /// Report account balances in today's money by dividing each year's
    /// post-growth balance by the inflation factor.
    pub real_terms: bool,
    pub accounts: Vec<Account>,
    pub liabilities: Vec<Liability>,
}

/// One named balance trajectory, index-aligned with `ProjectionResult::years`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub name: String,
    pub balances: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    /// Attained ages from current age to life expectancy inclusive.
    pub years: Vec<u32>,
    pub accounts: Vec<Series>,
    pub liabilities: Vec<Series>,
    pub total_assets: Vec<f64>,
    pub total_liabilities: Vec<f64>,
    pub net_worth: Vec<f64>,
}

impl ProjectionResult {
    pub fn horizon(&self) -> usize {
        self.years.len()
    }
}
