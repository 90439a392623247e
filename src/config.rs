use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;

use crate::scheduler::EligibilityRule;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    /// Anti-forgery token expected in every admin request. Empty disables the check.
    pub form_token: String,
    pub scheduler: SchedulerConfig,
    pub table: TableConfig,
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Provider tag written on every job row.
    pub provider: String,
    /// Titles read per page while scanning.
    pub page_size: u64,
    pub freshness_days: i64,
    pub eligibility: EligibilityRule,
    /// Run the scheduler once a day inside `serve`.
    pub daily: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            provider: "putlocker".to_string(),
            page_size: 50,
            freshness_days: 7,
            eligibility: EligibilityRule::Literal,
            daily: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableConfig {
    pub base_url: String,
    pub per_page: u64,
    pub max_per_page: u64,
    pub debounce: Duration,
    pub no_results_text: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            per_page: 15,
            max_per_page: 100,
            debounce: Duration::from_millis(400),
            no_results_text: "No results found.".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://cinedex.db?mode=rwc".to_string());

        let form_token = std::env::var("FORM_TOKEN").unwrap_or_default().trim().to_string();

        let scheduler_defaults = SchedulerConfig::default();
        let eligibility = match std::env::var("SCRAPE_ELIGIBILITY") {
            Ok(raw) => raw.parse().context("SCRAPE_ELIGIBILITY")?,
            Err(_) => scheduler_defaults.eligibility,
        };
        let scheduler = SchedulerConfig {
            provider: std::env::var("SCRAPE_PROVIDER").unwrap_or(scheduler_defaults.provider),
            page_size: env_or("SCRAPE_PAGE_SIZE", scheduler_defaults.page_size).max(1),
            freshness_days: env_or("SCRAPE_FRESHNESS_DAYS", scheduler_defaults.freshness_days),
            eligibility,
            daily: env_or("SCRAPE_DAILY", scheduler_defaults.daily),
        };

        let table_defaults = TableConfig::default();
        let table = TableConfig {
            base_url: std::env::var("TABLE_BASE_URL").unwrap_or(table_defaults.base_url),
            per_page: env_or("TABLE_PER_PAGE", table_defaults.per_page).max(1),
            max_per_page: env_or("TABLE_MAX_PER_PAGE", table_defaults.max_per_page).max(1),
            debounce: Duration::from_millis(env_or(
                "TABLE_DEBOUNCE_MS",
                table_defaults.debounce.as_millis() as u64,
            )),
            no_results_text: std::env::var("NO_RESULTS_TEXT")
                .unwrap_or(table_defaults.no_results_text),
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            form_token,
            scheduler,
            table,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
