use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Account, ContributionPhase, Liability, LiabilityMode, ProjectionInput, ProjectionResult,
    Series, project,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Debug, Clone, Parser)]
#[command(name = "nestegg", about = "Lifetime net-worth projection")]
struct Cli {
    #[arg(long, default_value_t = 30, help = "Current age")]
    current_age: u32,
    #[arg(long, default_value_t = 65, help = "Retirement age")]
    retirement_age: u32,
    #[arg(long, default_value_t = 85, help = "Age to project through")]
    life_expectancy: u32,
    #[arg(long, default_value_t = 2.0, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, help = "Report account balances in today's money")]
    real_terms: bool,

    #[arg(long, default_value_t = 25000.0, help = "Initial superannuation balance")]
    super_balance: f64,
    #[arg(
        long,
        default_value_t = 15000.0,
        help = "Annual contribution to superannuation while working"
    )]
    super_contribution: f64,
    #[arg(long, default_value_t = 4.0, help = "Superannuation return in percent")]
    super_return: f64,
    #[arg(
        long,
        default_value_t = 70.0,
        help = "Retirement income as percent of the starting super balance, drawn down each year after retirement"
    )]
    income_replacement_ratio: f64,

    #[arg(long, default_value_t = 100000.0, help = "Initial home balance")]
    home_balance: f64,
    #[arg(long, default_value_t = 5000.0, help = "Annual contribution to home")]
    home_contribution: f64,
    #[arg(long, default_value_t = 3.0, help = "Home return in percent")]
    home_return: f64,

    #[arg(long, default_value_t = 200000.0, help = "Initial stocks balance")]
    stocks_balance: f64,
    #[arg(long, default_value_t = 5000.0, help = "Annual contribution to stocks")]
    stocks_contribution: f64,
    #[arg(long, default_value_t = 7.0, help = "Stocks return in percent")]
    stocks_return: f64,

    #[arg(long, default_value_t = 100000.0, help = "Initial bonds balance")]
    bonds_balance: f64,
    #[arg(long, default_value_t = 5000.0, help = "Annual contribution to bonds")]
    bonds_contribution: f64,
    #[arg(long, default_value_t = 2.0, help = "Bonds return in percent")]
    bonds_return: f64,

    #[arg(long, default_value_t = 10000.0, help = "Initial cash balance")]
    cash_balance: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual contribution to cash")]
    cash_contribution: f64,
    #[arg(long, default_value_t = 0.0, help = "Cash return in percent")]
    cash_return: f64,

    #[arg(long, default_value_t = 50000.0, help = "Outstanding mortgage balance")]
    mortgage_balance: f64,
    #[arg(long, default_value_t = 5.0, help = "Mortgage interest rate in percent")]
    mortgage_rate: f64,
    #[arg(long, default_value_t = 6000.0, help = "Annual mortgage payment")]
    mortgage_payment: f64,

    #[arg(
        long,
        default_value_t = 20000.0,
        help = "Annual living expenses accrued into the expense bucket"
    )]
    living_expenses: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Growth rate of the accrued expense bucket in percent"
    )]
    expense_growth_rate: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiLiabilityMode {
    #[serde(alias = "amortising")]
    Amortizing,
    #[serde(alias = "accruedExpense", alias = "accrued_expense")]
    AccruedExpense,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountPayload {
    name: String,
    #[serde(default)]
    initial_balance: f64,
    #[serde(default)]
    annual_contribution: f64,
    #[serde(default)]
    annual_drawdown: f64,
    #[serde(default)]
    annual_rate_of_return: f64,
    #[serde(default)]
    contribute_after_retirement: bool,
}

impl From<AccountPayload> for Account {
    fn from(payload: AccountPayload) -> Self {
        Account {
            name: payload.name,
            initial_balance: payload.initial_balance,
            annual_contribution: payload.annual_contribution,
            annual_drawdown: payload.annual_drawdown,
            annual_rate_of_return: payload.annual_rate_of_return,
            contribution_phase: if payload.contribute_after_retirement {
                ContributionPhase::ContinueAfterRetirement
            } else {
                ContributionPhase::StopAtRetirement
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiabilityPayload {
    name: String,
    #[serde(default)]
    initial_balance: f64,
    #[serde(default)]
    annual_interest_rate: f64,
    mode: ApiLiabilityMode,
    #[serde(default)]
    annual_payment: f64,
    #[serde(default)]
    annual_expense: f64,
}

impl From<LiabilityPayload> for Liability {
    fn from(payload: LiabilityPayload) -> Self {
        let mode = match payload.mode {
            ApiLiabilityMode::Amortizing => LiabilityMode::Amortizing {
                annual_payment: payload.annual_payment,
            },
            ApiLiabilityMode::AccruedExpense => LiabilityMode::AccruedExpense {
                annual_expense: payload.annual_expense,
            },
        };
        Liability {
            name: payload.name,
            initial_balance: payload.initial_balance,
            annual_interest_rate: payload.annual_interest_rate,
            mode,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    inflation_rate: Option<f64>,
    real_terms: Option<bool>,
    super_balance: Option<f64>,
    super_contribution: Option<f64>,
    super_return: Option<f64>,
    income_replacement_ratio: Option<f64>,
    home_balance: Option<f64>,
    home_contribution: Option<f64>,
    home_return: Option<f64>,
    stocks_balance: Option<f64>,
    stocks_contribution: Option<f64>,
    stocks_return: Option<f64>,
    bonds_balance: Option<f64>,
    bonds_contribution: Option<f64>,
    bonds_return: Option<f64>,
    cash_balance: Option<f64>,
    cash_contribution: Option<f64>,
    cash_return: Option<f64>,
    mortgage_balance: Option<f64>,
    mortgage_rate: Option<f64>,
    mortgage_payment: Option<f64>,
    living_expenses: Option<f64>,
    expense_growth_rate: Option<f64>,
    // Full custom collections replace the slider-derived defaults entirely.
    accounts: Option<Vec<AccountPayload>>,
    liabilities: Option<Vec<LiabilityPayload>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    years: Vec<u32>,
    #[serde(serialize_with = "serialize_series_map")]
    accounts: Vec<Series>,
    #[serde(serialize_with = "serialize_series_map")]
    liabilities: Vec<Series>,
    total_assets: Vec<f64>,
    total_liabilities: Vec<f64>,
    net_worth: Vec<f64>,
}

impl From<ProjectionResult> for ProjectResponse {
    fn from(result: ProjectionResult) -> Self {
        ProjectResponse {
            years: result.years,
            accounts: result.accounts,
            liabilities: result.liabilities,
            total_assets: result.total_assets,
            total_liabilities: result.total_liabilities,
            net_worth: result.net_worth,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// Series maps keep the caller's declaration order; they serialize as
// {"name": [balances...]} records rather than arrays of structs.
fn serialize_series_map<S: Serializer>(series: &[Series], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(series.len()))?;
    for s in series {
        map.serialize_entry(&s.name, &s.balances)?;
    }
    map.end()
}

fn default_cli() -> Cli {
    Cli::parse_from(["nestegg"])
}

fn build_input(cli: &Cli) -> ProjectionInput {
    // The super drawdown mirrors the income-replacement slider: a fixed
    // annual amount set against the starting super balance.
    let super_drawdown = cli.super_balance * cli.income_replacement_ratio / 100.0;

    let account = |name: &str, balance: f64, contribution: f64, rate: f64| Account {
        name: name.to_string(),
        initial_balance: balance,
        annual_contribution: contribution,
        annual_drawdown: 0.0,
        annual_rate_of_return: rate,
        contribution_phase: ContributionPhase::StopAtRetirement,
    };

    ProjectionInput {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy: cli.life_expectancy,
        inflation_rate: cli.inflation_rate,
        real_terms: cli.real_terms,
        accounts: vec![
            Account {
                annual_drawdown: super_drawdown,
                ..account(
                    "Superannuation",
                    cli.super_balance,
                    cli.super_contribution,
                    cli.super_return,
                )
            },
            account("Home", cli.home_balance, cli.home_contribution, cli.home_return),
            account(
                "Stocks",
                cli.stocks_balance,
                cli.stocks_contribution,
                cli.stocks_return,
            ),
            account(
                "Bonds",
                cli.bonds_balance,
                cli.bonds_contribution,
                cli.bonds_return,
            ),
            account("Cash", cli.cash_balance, cli.cash_contribution, cli.cash_return),
        ],
        liabilities: vec![
            Liability {
                name: "Mortgage".to_string(),
                initial_balance: cli.mortgage_balance,
                annual_interest_rate: cli.mortgage_rate,
                mode: LiabilityMode::Amortizing {
                    annual_payment: cli.mortgage_payment,
                },
            },
            Liability {
                name: "Living Expenses".to_string(),
                initial_balance: 0.0,
                annual_interest_rate: cli.expense_growth_rate,
                mode: LiabilityMode::AccruedExpense {
                    annual_expense: cli.living_expenses,
                },
            },
        ],
    }
}

fn input_from_payload(payload: ProjectPayload) -> ProjectionInput {
    let mut cli = default_cli();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.real_terms {
        cli.real_terms = v;
    }
    if let Some(v) = payload.super_balance {
        cli.super_balance = v;
    }
    if let Some(v) = payload.super_contribution {
        cli.super_contribution = v;
    }
    if let Some(v) = payload.super_return {
        cli.super_return = v;
    }
    if let Some(v) = payload.income_replacement_ratio {
        cli.income_replacement_ratio = v;
    }
    if let Some(v) = payload.home_balance {
        cli.home_balance = v;
    }
    if let Some(v) = payload.home_contribution {
        cli.home_contribution = v;
    }
    if let Some(v) = payload.home_return {
        cli.home_return = v;
    }
    if let Some(v) = payload.stocks_balance {
        cli.stocks_balance = v;
    }
    if let Some(v) = payload.stocks_contribution {
        cli.stocks_contribution = v;
    }
    if let Some(v) = payload.stocks_return {
        cli.stocks_return = v;
    }
    if let Some(v) = payload.bonds_balance {
        cli.bonds_balance = v;
    }
    if let Some(v) = payload.bonds_contribution {
        cli.bonds_contribution = v;
    }
    if let Some(v) = payload.bonds_return {
        cli.bonds_return = v;
    }
    if let Some(v) = payload.cash_balance {
        cli.cash_balance = v;
    }
    if let Some(v) = payload.cash_contribution {
        cli.cash_contribution = v;
    }
    if let Some(v) = payload.cash_return {
        cli.cash_return = v;
    }
    if let Some(v) = payload.mortgage_balance {
        cli.mortgage_balance = v;
    }
    if let Some(v) = payload.mortgage_rate {
        cli.mortgage_rate = v;
    }
    if let Some(v) = payload.mortgage_payment {
        cli.mortgage_payment = v;
    }
    if let Some(v) = payload.living_expenses {
        cli.living_expenses = v;
    }
    if let Some(v) = payload.expense_growth_rate {
        cli.expense_growth_rate = v;
    }

    let mut input = build_input(&cli);
    if let Some(accounts) = payload.accounts {
        input.accounts = accounts.into_iter().map(Account::from).collect();
    }
    if let Some(liabilities) = payload.liabilities {
        input.liabilities = liabilities.into_iter().map(Liability::from).collect();
    }
    input
}

pub fn run_projection<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let input = build_input(&cli);
    let result = project(&input).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&ProjectResponse::from(result)).map_err(|e| e.to_string())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("nestegg dashboard listening on http://{addr}");
    log::info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let input = input_from_payload(payload);
    match project(&input) {
        Ok(result) => json_response(StatusCode::OK, ProjectResponse::from(result)),
        Err(e) => {
            log::warn!("rejected projection request: {e}");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn payload_from_json(json: &str) -> ProjectPayload {
        serde_json::from_str(json).expect("payload should parse")
    }

    #[test]
    fn default_scenario_projects_full_horizon() {
        let input = build_input(&default_cli());
        let result = project(&input).expect("default scenario must be valid");

        // Ages 30..=85 inclusive.
        assert_eq!(result.horizon(), 56);
        assert_eq!(result.years[0], 30);
        assert_eq!(result.years[55], 85);

        // Year-zero snapshot: 25k super + 100k home + 200k stocks +
        // 100k bonds + 10k cash against the 50k mortgage.
        assert_approx(result.total_assets[0], 435_000.0);
        assert_approx(result.total_liabilities[0], 50_000.0);
        assert_approx(result.net_worth[0], 385_000.0);
    }

    #[test]
    fn income_replacement_ratio_sets_super_drawdown() {
        let mut cli = default_cli();
        cli.super_balance = 25_000.0;
        cli.income_replacement_ratio = 70.0;

        let input = build_input(&cli);
        assert_approx(input.accounts[0].annual_drawdown, 17_500.0);
    }

    #[test]
    fn payload_overrides_scalar_sliders() {
        let payload = payload_from_json(
            r#"{
              "currentAge": 40,
              "retirementAge": 60,
              "lifeExpectancy": 90,
              "inflationRate": 3,
              "realTerms": true,
              "superBalance": 250000,
              "stocksReturn": 8.5,
              "mortgagePayment": 24000
            }"#,
        );
        let input = input_from_payload(payload);

        assert_eq!(input.current_age, 40);
        assert_eq!(input.retirement_age, 60);
        assert_eq!(input.life_expectancy, 90);
        assert_approx(input.inflation_rate, 3.0);
        assert!(input.real_terms);
        assert_approx(input.accounts[0].initial_balance, 250_000.0);
        assert_approx(input.accounts[2].annual_rate_of_return, 8.5);
        assert!(matches!(
            input.liabilities[0].mode,
            LiabilityMode::Amortizing { annual_payment } if annual_payment == 24_000.0
        ));
        // Untouched sliders keep their defaults.
        assert_approx(input.accounts[1].initial_balance, 100_000.0);
    }

    #[test]
    fn payload_custom_collections_replace_defaults() {
        let payload = payload_from_json(
            r#"{
              "accounts": [
                {"name": "Pension", "initialBalance": 50000, "annualContribution": 12000,
                 "annualRateOfReturn": 6, "contributeAfterRetirement": true},
                {"name": "Savings", "initialBalance": 8000}
              ],
              "liabilities": [
                {"name": "Car Loan", "initialBalance": 15000, "annualInterestRate": 9,
                 "mode": "amortizing", "annualPayment": 4000},
                {"name": "Healthcare", "mode": "accrued-expense", "annualExpense": 10000}
              ]
            }"#,
        );
        let input = input_from_payload(payload);

        assert_eq!(input.accounts.len(), 2);
        assert_eq!(input.accounts[0].name, "Pension");
        assert_eq!(
            input.accounts[0].contribution_phase,
            ContributionPhase::ContinueAfterRetirement
        );
        assert_approx(input.accounts[1].initial_balance, 8_000.0);
        assert_approx(input.accounts[1].annual_contribution, 0.0);

        assert_eq!(input.liabilities.len(), 2);
        assert!(matches!(
            input.liabilities[0].mode,
            LiabilityMode::Amortizing { annual_payment } if annual_payment == 4_000.0
        ));
        assert!(matches!(
            input.liabilities[1].mode,
            LiabilityMode::AccruedExpense { annual_expense } if annual_expense == 10_000.0
        ));
    }

    #[test]
    fn liability_mode_accepts_camel_case_alias() {
        let payload = payload_from_json(
            r#"{"liabilities": [{"name": "Rent", "mode": "accruedExpense", "annualExpense": 1}]}"#,
        );
        let input = input_from_payload(payload);
        assert!(matches!(
            input.liabilities[0].mode,
            LiabilityMode::AccruedExpense { .. }
        ));
    }

    #[test]
    fn invalid_age_range_surfaces_engine_error() {
        let payload = payload_from_json(r#"{"currentAge": 65, "retirementAge": 65}"#);
        let input = input_from_payload(payload);
        let err = project(&input).expect_err("must reject equal ages");
        assert!(err.to_string().contains("retirement age"));
    }

    #[test]
    fn response_serializes_series_as_name_keyed_maps() {
        let input = build_input(&default_cli());
        let result = project(&input).expect("valid input");
        let json =
            serde_json::to_string(&ProjectResponse::from(result)).expect("response serializes");

        assert!(json.contains("\"years\":[30,"));
        assert!(json.contains("\"Superannuation\":["));
        assert!(json.contains("\"Mortgage\":["));
        assert!(json.contains("\"totalAssets\""));
        assert!(json.contains("\"totalLiabilities\""));
        assert!(json.contains("\"netWorth\""));
        // Series are map entries, not {"name": ..} objects.
        assert!(!json.contains("\"balances\""));
    }

    #[test]
    fn run_projection_emits_json_for_default_flags() {
        let json = run_projection(["nestegg"]).expect("default flags must project");
        let value: serde_json::Value = serde_json::from_str(&json).expect("output is JSON");
        assert!(value.get("netWorth").is_some());
        assert_eq!(value["years"][0], 30);
    }

    #[test]
    fn run_projection_reports_validation_failure() {
        let err = run_projection(["nestegg", "--retirement-age", "20"])
            .expect_err("retirement before current age must fail");
        assert!(err.contains("retirement age"));
    }
}
