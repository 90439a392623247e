mod catalog;
mod config;
mod db;
mod entities;
mod error;
mod extract;
mod models;
mod routes;
mod scheduler;
mod table;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::{
    catalog::Catalog,
    config::Config,
    models::{LinkRow, TitleRow, UserRow},
    scheduler::ScrapeScheduler,
    table::{HttpPageSource, NoticeKind, PagedTable, TableOptions, TableRow},
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
}

#[derive(Parser)]
#[command(name = "cinedex", about = "Movie and series catalogue back office")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the admin paginate/delete API
    Serve,

    /// Enqueue link scrapes for every eligible title, once
    ScheduleScrapes,

    /// Print one page of an admin table from a running server
    Browse {
        entity: Entity,

        #[arg(long, default_value_t = 1)]
        page: u64,

        #[arg(long)]
        per_page: Option<u64>,

        /// Search text
        #[arg(long)]
        query: Option<String>,

        /// Title type filter (movie or series)
        #[arg(long = "type")]
        kind: Option<String>,

        #[arg(long)]
        order: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Entity {
    Titles,
    Links,
    Users,
}

impl Entity {
    fn uri(self) -> &'static str {
        match self {
            Entity::Titles => "titles",
            Entity::Links => "links",
            Entity::Users => "users",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinedex=debug,sqlx=warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::from_env()?);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::ScheduleScrapes => schedule_scrapes(config).await,
        Command::Browse { entity, page, per_page, query, kind, order } => {
            let filters = [("query", query), ("type", kind), ("order", order)]
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v)))
                .collect::<Vec<_>>();
            let browse = Browse { config, page, per_page, filters };
            match entity {
                Entity::Titles => browse.run::<TitleRow>(entity.uri()).await,
                Entity::Links => browse.run::<LinkRow>(entity.uri()).await,
                Entity::Users => browse.run::<UserRow>(entity.uri()).await,
            }
        },
    }
}

async fn connect(config: &Config) -> anyhow::Result<Catalog> {
    let db = db::connect_and_migrate(&config.database_url).await.context("database")?;
    Ok(Catalog::new(db, config.table.per_page, config.table.max_per_page))
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    if routes::token_check_disabled(&config) {
        tracing::warn!("FORM_TOKEN is empty, admin requests are not checked for a form token");
    }

    let catalog = connect(&config).await?;

    if config.scheduler.daily {
        let scheduler = ScrapeScheduler::new(catalog.clone(), config.scheduler.clone());
        tokio::spawn(async move { scheduler.run_every(DAY).await });
        tracing::info!("daily link scrape scheduling enabled");
    }

    let state = Arc::new(AppState { config: config.clone(), catalog });
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn schedule_scrapes(config: Arc<Config>) -> anyhow::Result<()> {
    let catalog = connect(&config).await?;
    let scheduler = ScrapeScheduler::new(catalog, config.scheduler.clone());
    let summary = scheduler.run().await.context("link scrape scheduling aborted")?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

struct Browse {
    config: Arc<Config>,
    page: u64,
    per_page: Option<u64>,
    filters: Vec<(&'static str, String)>,
}

impl Browse {
    async fn run<R: TableRow + Serialize>(self, uri: &str) -> anyhow::Result<()> {
        let http = reqwest::Client::builder()
            .user_agent("cinedex/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        let source =
            HttpPageSource::new(http, self.config.table.base_url.clone(), self.config.form_token.clone());

        let mut options = TableOptions::from(&self.config.table);
        if let Some(per_page) = self.per_page {
            options.per_page = per_page;
        }
        let mut table: PagedTable<R> = PagedTable::spawn(source, uri, options);

        if self.filters.is_empty() {
            table.start();
        } else {
            for (name, value) in &self.filters {
                table.set_param(*name, value.as_str());
            }
        }

        let mut seq = 1;
        let mut view = table.settled(seq).await;
        while view.current_page < self.page && view.has_next && view.notice.is_none() {
            table.next_page();
            seq += 1;
            view = table.settled(seq).await;
        }

        if let Some(notice) = view.notice.as_ref().filter(|n| n.kind == NoticeKind::Error) {
            anyhow::bail!("{}", notice.message);
        }

        for row in &view.rows {
            println!("{}", serde_json::to_string(row)?);
        }
        match &view.placeholder {
            Some(text) => eprintln!("{text}"),
            None => eprintln!("page {} of {}", view.current_page, view.total_pages),
        }

        Ok(())
    }
}
