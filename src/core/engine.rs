use std::collections::HashSet;

use super::error::ProjectionError;
use super::types::{
    Account, ContributionPhase, Liability, LiabilityMode, ProjectionInput, ProjectionResult,
    Series,
};

pub fn project(input: &ProjectionInput) -> Result<ProjectionResult, ProjectionError> {
    validate(input)?;

    let years: Vec<u32> = (input.current_age..=input.life_expectancy).collect();
    let horizon = years.len();
    let inflation_factor = 1.0 + input.inflation_rate / 100.0;

    let mut accounts: Vec<Series> = input
        .accounts
        .iter()
        .map(|a| seed_series(&a.name, a.initial_balance, horizon))
        .collect();
    let mut liabilities: Vec<Series> = input
        .liabilities
        .iter()
        .map(|l| seed_series(&l.name, l.initial_balance, horizon))
        .collect();

    // Index 0 is the starting snapshot; evolution begins at index 1.
    for i in 1..horizon {
        let age = years[i];

        for (account, series) in input.accounts.iter().zip(accounts.iter_mut()) {
            let prev = series.balances[i - 1];
            series
                .balances
                .push(account_step(account, prev, age, input, inflation_factor));
        }

        for (liability, series) in input.liabilities.iter().zip(liabilities.iter_mut()) {
            let prev = series.balances[i - 1];
            series
                .balances
                .push(liability_step(liability, prev, inflation_factor));
        }
    }

    let mut total_assets = Vec::with_capacity(horizon);
    let mut total_liabilities = Vec::with_capacity(horizon);
    let mut net_worth = Vec::with_capacity(horizon);
    for i in 0..horizon {
        let assets: f64 = accounts.iter().map(|s| s.balances[i]).sum();
        let owed: f64 = liabilities.iter().map(|s| s.balances[i]).sum();
        total_assets.push(assets);
        total_liabilities.push(owed);
        net_worth.push(assets - owed);
    }

    Ok(ProjectionResult {
        years,
        accounts,
        liabilities,
        total_assets,
        total_liabilities,
        net_worth,
    })
}

fn seed_series(name: &str, initial_balance: f64, horizon: usize) -> Series {
    let mut balances = Vec::with_capacity(horizon);
    balances.push(initial_balance);
    Series {
        name: name.to_string(),
        balances,
    }
}

// Fixed order of operations: grow the prior balance, add the gated
// contribution, deflate if reporting in today's money, then take the
// post-retirement drawdown. Contributions earn no return in the year they
// are made, and drawdowns are not deflated.
fn account_step(
    account: &Account,
    prev: f64,
    age: u32,
    input: &ProjectionInput,
    inflation_factor: f64,
) -> f64 {
    let mut next = prev * (1.0 + account.annual_rate_of_return / 100.0);

    let contributing = age <= input.retirement_age
        || account.contribution_phase == ContributionPhase::ContinueAfterRetirement;
    if contributing {
        next += account.annual_contribution;
    }

    if input.real_terms {
        next /= inflation_factor;
    }

    if age > input.retirement_age {
        next -= account.annual_drawdown;
    }

    next
}

fn liability_step(liability: &Liability, prev: f64, inflation_factor: f64) -> f64 {
    let accrued = prev * (1.0 + liability.annual_interest_rate / 100.0);
    match liability.mode {
        // A paid-off debt stays at zero; it never loans money back.
        LiabilityMode::Amortizing { annual_payment } => (accrued - annual_payment).max(0.0),
        LiabilityMode::AccruedExpense { annual_expense } => {
            accrued / inflation_factor + annual_expense
        }
    }
}

fn validate(input: &ProjectionInput) -> Result<(), ProjectionError> {
    if input.retirement_age <= input.current_age {
        return Err(ProjectionError::InvalidRange(format!(
            "retirement age {} must be greater than current age {}",
            input.retirement_age, input.current_age
        )));
    }
    if input.life_expectancy < input.retirement_age {
        return Err(ProjectionError::InvalidRange(format!(
            "life expectancy {} must not precede retirement age {}",
            input.life_expectancy, input.retirement_age
        )));
    }

    if !input.inflation_rate.is_finite() {
        return Err(ProjectionError::InvalidInput(format!(
            "inflation rate must be finite, got {}",
            input.inflation_rate
        )));
    }
    if input.inflation_rate == -100.0 {
        return Err(ProjectionError::InvalidInput(
            "inflation rate of -100 makes the deflation factor zero".to_string(),
        ));
    }

    if input.accounts.is_empty() {
        return Err(ProjectionError::InvalidInput(
            "at least one account is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for account in &input.accounts {
        if !seen.insert(account.name.as_str()) {
            return Err(ProjectionError::DuplicateName(format!(
                "account {:?}",
                account.name
            )));
        }
        check_amount(&account.name, "initial balance", account.initial_balance)?;
        check_amount(
            &account.name,
            "annual contribution",
            account.annual_contribution,
        )?;
        check_amount(&account.name, "annual drawdown", account.annual_drawdown)?;
        check_rate(
            &account.name,
            "rate of return",
            account.annual_rate_of_return,
        )?;
    }

    let mut seen = HashSet::new();
    for liability in &input.liabilities {
        if !seen.insert(liability.name.as_str()) {
            return Err(ProjectionError::DuplicateName(format!(
                "liability {:?}",
                liability.name
            )));
        }
        check_amount(&liability.name, "initial balance", liability.initial_balance)?;
        check_rate(
            &liability.name,
            "interest rate",
            liability.annual_interest_rate,
        )?;
        match liability.mode {
            LiabilityMode::Amortizing { annual_payment } => {
                check_amount(&liability.name, "annual payment", annual_payment)?;
            }
            LiabilityMode::AccruedExpense { annual_expense } => {
                check_amount(&liability.name, "annual expense", annual_expense)?;
            }
        }
    }

    Ok(())
}

fn check_amount(owner: &str, label: &str, value: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProjectionError::InvalidInput(format!(
            "{label} for {owner:?} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

fn check_rate(owner: &str, label: &str, value: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() {
        return Err(ProjectionError::InvalidInput(format!(
            "{label} for {owner:?} must be finite, got {value}"
        )));
    }
    Ok(())
}
