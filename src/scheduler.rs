use std::{str::FromStr, time::Duration};

use sea_orm::DbErr;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::SchedulerConfig,
    entities::{link_scrape, title},
    models::TitleType,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Storage the scheduler reads titles from and writes scrape jobs to.
pub trait ScrapeStore {
    /// Titles ordered by id, `limit` rows starting at `offset`.
    async fn titles_page(&self, offset: u64, limit: u64) -> Result<Vec<title::Model>, DbErr>;

    /// The job with the latest `started_at` for a title, if any.
    async fn latest_scrape(&self, title_id: i32) -> Result<Option<link_scrape::Model>, DbErr>;

    /// Inserts a job row and returns its id. `started_at` is left to storage.
    async fn enqueue_scrape(&self, provider: &str, title_id: i32) -> Result<i32, DbErr>;
}

/// How the previous job's `ended_at` decides whether a title gets a new job.
///
/// `Literal` keeps the historical comparison: a title is eligible when its last job
/// ended *after* the freshness cutoff. That reads inverted against the job's purpose
/// (skip recently scraped titles) but stays the default until product confirms the fix.
/// `Stale` is the corrected rule: eligible once the last job ended at or before the cutoff.
/// Under both rules a job that has not ended yet blocks a new one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityRule {
    Literal,
    Stale,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown eligibility rule `{0}`, expected `literal` or `stale`")]
pub struct UnknownEligibilityRule(String);

impl FromStr for EligibilityRule {
    type Err = UnknownEligibilityRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(EligibilityRule::Literal),
            "stale" => Ok(EligibilityRule::Stale),
            other => Err(UnknownEligibilityRule(other.to_string())),
        }
    }
}

impl EligibilityRule {
    pub fn is_eligible(self, last: Option<&link_scrape::Model>, cutoff: i64) -> bool {
        let Some(last) = last else {
            return true;
        };
        match (self, last.ended_at) {
            (_, None) => false,
            (EligibilityRule::Literal, Some(ended)) => ended > cutoff,
            (EligibilityRule::Stale, Some(ended)) => ended <= cutoff,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages: u64,
    pub scanned: u64,
    pub skipped_series: u64,
    pub skipped_fresh: u64,
    pub enqueued: u64,
    pub failed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to read titles at offset {offset}")]
    TitlesPage {
        offset: u64,
        #[source]
        source: DbErr,
    },
}

#[derive(Debug, Eq, PartialEq)]
enum Outcome {
    Enqueued(i32),
    Series,
    Fresh,
}

pub struct ScrapeScheduler<S> {
    store: S,
    config: SchedulerConfig,
}

impl<S: ScrapeStore> ScrapeScheduler<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        self.run_at(jiff::Timestamp::now().as_second()).await
    }

    /// Scans every title once, `now` in unix seconds.
    ///
    /// Only a failed page read aborts the run. Failures on a single title are logged and
    /// counted, and the scan moves on.
    pub async fn run_at(&self, now: i64) -> Result<RunSummary, SchedulerError> {
        let page_size = self.config.page_size.max(1);
        let cutoff = now.saturating_sub(self.config.freshness_days * SECONDS_PER_DAY);

        info!(
            provider = %self.config.provider,
            rule = ?self.config.eligibility,
            cutoff = cutoff,
            page_size = page_size,
            "scheduling link scrapes"
        );

        let mut summary = RunSummary::default();
        let mut offset = 0;

        loop {
            let titles = self
                .store
                .titles_page(offset, page_size)
                .await
                .map_err(|source| SchedulerError::TitlesPage { offset, source })?;

            if titles.is_empty() {
                break;
            }

            summary.pages += 1;
            debug!(page = summary.pages, titles = titles.len(), "scanning titles page");

            for title in &titles {
                summary.scanned += 1;
                match self.schedule_title(title, cutoff).await {
                    Ok(Outcome::Enqueued(job_id)) => {
                        debug!(title_id = title.id, job_id = job_id, "enqueued link scrape");
                        summary.enqueued += 1;
                    },
                    Ok(Outcome::Series) => summary.skipped_series += 1,
                    Ok(Outcome::Fresh) => summary.skipped_fresh += 1,
                    Err(err) => {
                        warn!(title_id = title.id, error = %err, "failed to schedule link scrape");
                        summary.failed += 1;
                    },
                }
            }

            if (titles.len() as u64) < page_size {
                break;
            }
            offset += page_size;
        }

        info!(
            pages = summary.pages,
            scanned = summary.scanned,
            enqueued = summary.enqueued,
            skipped_series = summary.skipped_series,
            skipped_fresh = summary.skipped_fresh,
            failed = summary.failed,
            "link scrape scheduling complete"
        );

        Ok(summary)
    }

    async fn schedule_title(&self, title: &title::Model, cutoff: i64) -> Result<Outcome, DbErr> {
        let last = self.store.latest_scrape(title.id).await?;
        if !self.config.eligibility.is_eligible(last.as_ref(), cutoff) {
            return Ok(Outcome::Fresh);
        }
        if TitleType::from_code(&title.kind) == Some(TitleType::Series) {
            return Ok(Outcome::Series);
        }
        let job_id = self.store.enqueue_scrape(&self.config.provider, title.id).await?;
        Ok(Outcome::Enqueued(job_id))
    }

    /// Runs once immediately and then every `every`, never overlapping itself.
    pub async fn run_every(&self, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run().await {
                warn!(error = %err, source = ?std::error::Error::source(&err), "link scrape run aborted");
            }
        }
    }
}
