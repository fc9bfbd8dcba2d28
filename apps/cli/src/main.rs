#![deny(warnings)]

//! Headless runner: load a shop scenario, validate it, simulate N weeks and
//! print KPIs.

use std::path::Path;

use anyhow::{bail, Context, Result};
use sim_core::ShopConfig;
use sim_runtime::GameSession;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SCENARIO: &str = include_str!("../scenarios/default.yaml");

#[derive(Default)]
struct Args {
    scenario: Option<String>,
    weeks: Option<u64>,
    ledger_json: bool,
    upgrades: Vec<String>,
    hires: Vec<String>,
    campaign: Option<String>,
    events: Vec<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--weeks" => args.weeks = it.next().and_then(|s| s.parse().ok()),
            "--ledger-json" => args.ledger_json = true,
            "--upgrade" => args.upgrades.extend(it.next()),
            "--hire" => args.hires.extend(it.next()),
            "--campaign" => args.campaign = it.next(),
            "--event" => args.events.extend(it.next()),
            _ => {}
        }
    }
    args
}

fn load_config(path: Option<&str>) -> Result<ShopConfig> {
    let Some(path) = path else {
        return serde_yaml::from_str(DEFAULT_SCENARIO).context("parsing built-in scenario");
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let is_json = Path::new(path)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing {path} as JSON"))
    } else {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {path} as YAML"))
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(
        scenario = ?args.scenario,
        weeks = ?args.weeks,
        git = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        "starting shop-tycoon"
    );

    let config = load_config(args.scenario.as_deref())?;
    let mut session = GameSession::new(config).context("invalid scenario")?;

    for id in &args.upgrades {
        session
            .purchase_upgrade(id)
            .with_context(|| format!("upgrade {id}"))?;
    }
    for role in &args.hires {
        session.hire_staff(role).with_context(|| format!("hire {role}"))?;
    }
    if let Some(id) = &args.campaign {
        session
            .start_campaign(id)
            .with_context(|| format!("campaign {id}"))?;
    }
    for id in &args.events {
        session.apply_event(id).with_context(|| format!("event {id}"))?;
    }

    let weeks = args.weeks.unwrap_or(4);
    if weeks == 0 {
        bail!("--weeks must be at least 1");
    }
    session.run_periods(weeks);

    let state = session.state();
    let summary = session.ledger().summary();
    println!(
        "Shop OK | services: {} | upgrades: {} | staff roles: {}",
        session.config().services.len(),
        session.config().upgrades.len(),
        session.config().staff_roles.len()
    );
    println!(
        "KPI | weeks: {} | cash: ${} | revenue: ${} | expenses: ${} | profit: ${}",
        summary.periods,
        state.cash,
        summary.total_revenue,
        summary.total_expenses,
        summary.total_profit
    );
    println!(
        "KPI | level: {} | exp: {:.1} | served: {} | lost: {}",
        state.level, state.experience, state.customers_served, state.customers_lost
    );
    if session.is_bankrupt() {
        warn!(cash = %state.cash, "shop ended the run in debt");
    }
    if args.ledger_json {
        println!("{}", serde_json::to_string_pretty(session.ledger().entries())?);
    }

    Ok(())
}
