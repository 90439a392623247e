use std::{sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture, stream::FuturesUnordered};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::debug;

use super::{PageSource, TableError, TableRow, TableState, TableView, state::PageRequest};
use crate::{
    config::TableConfig,
    models::{PageResponse, ParamValue},
};

#[derive(Clone, Debug)]
pub struct TableOptions {
    pub per_page: u64,
    /// Quiet period a filter change must survive before it triggers a fetch.
    pub debounce: Duration,
    /// How long a notice stays in the view.
    pub notice_ttl: Duration,
    pub no_results_text: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions::from(&TableConfig::default())
    }
}

impl From<&TableConfig> for TableOptions {
    fn from(config: &TableConfig) -> Self {
        Self {
            per_page: config.per_page,
            debounce: config.debounce,
            notice_ttl: Duration::from_secs(4),
            no_results_text: config.no_results_text.clone(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Next,
    Previous,
    Refresh,
    PerPage(u64),
    Param(String, Option<ParamValue>),
    Delete(i64),
}

enum Completion<R> {
    Page(u64, Result<PageResponse<R>, TableError>),
    Deleted(i64, Result<String, TableError>),
}

/// Handle to a running table. Dropping it stops the table's task.
pub struct PagedTable<R> {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<TableView<R>>,
    task: JoinHandle<()>,
}

impl<R: TableRow> PagedTable<R> {
    pub fn spawn<S: PageSource>(source: S, uri: impl Into<String>, options: TableOptions) -> Self {
        let state = TableState::new(options.per_page);
        let (view_tx, view) = watch::channel(state.view(&options.no_results_text));
        let (commands, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            source: Arc::new(source),
            uri: uri.into(),
            options,
            state,
            view: view_tx,
            inflight: FuturesUnordered::new(),
            debounce_at: None,
            notice_until: None,
        };
        let task = tokio::spawn(worker.run(rx));

        Self { commands, view, task }
    }

    /// Loads the first page.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn next_page(&self) {
        self.send(Command::Next);
    }

    pub fn previous_page(&self) {
        self.send(Command::Previous);
    }

    /// Reloads the current page, superseding anything in flight.
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn set_per_page(&self, per_page: u64) {
        self.send(Command::PerPage(per_page));
    }

    pub fn set_param(&self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.send(Command::Param(name.into(), Some(value.into())));
    }

    pub fn clear_param(&self, name: impl Into<String>) {
        self.send(Command::Param(name.into(), None));
    }

    pub fn delete_item(&self, row: &R) {
        self.send(Command::Delete(row.id()));
    }

    pub fn view(&self) -> TableView<R> {
        (*self.view.borrow()).clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TableView<R>> {
        self.view.clone()
    }

    /// Waits until request `seq` (or a later one) has been answered and the table is unlocked.
    pub async fn settled(&mut self, seq: u64) -> TableView<R> {
        let settled = self.view.wait_for(|v| v.seq >= seq && !v.locked).await.map(|v| (*v).clone());
        settled.unwrap_or_else(|_| self.view())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("table task has stopped, dropping command");
        }
    }
}

impl<R> Drop for PagedTable<R> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker<S, R> {
    source: Arc<S>,
    uri: String,
    options: TableOptions,
    state: TableState<R>,
    view: watch::Sender<TableView<R>>,
    inflight: FuturesUnordered<BoxFuture<'static, Completion<R>>>,
    debounce_at: Option<Instant>,
    notice_until: Option<Instant>,
}

impl<S: PageSource, R: TableRow> Worker<S, R> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(done) = self.inflight.next() => self.complete(done),
                _ = sleep_until(self.debounce_at.unwrap_or_else(Instant::now)), if self.debounce_at.is_some() => {
                    self.debounce_at = None;
                    let req = self.state.settle_filters();
                    self.fetch(req);
                },
                _ = sleep_until(self.notice_until.unwrap_or_else(Instant::now)), if self.notice_until.is_some() => {
                    self.notice_until = None;
                    self.state.dismiss_notice();
                },
            }
            self.publish();
        }
        debug!(uri = %self.uri, "table closed");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start | Command::Refresh => {
                let req = self.state.begin_fetch();
                self.fetch(req);
            },
            Command::Next => match self.state.next_page() {
                Some(req) => self.fetch(req),
                None => debug!(uri = %self.uri, "next page not available"),
            },
            Command::Previous => match self.state.previous_page() {
                Some(req) => self.fetch(req),
                None => debug!(uri = %self.uri, "previous page not available"),
            },
            Command::PerPage(per_page) => {
                self.state.set_per_page(per_page);
                self.debounce_at = Some(Instant::now() + self.options.debounce);
            },
            Command::Param(name, value) => {
                self.state.stage_param(name, value);
                self.debounce_at = Some(Instant::now() + self.options.debounce);
            },
            Command::Delete(id) => {
                if !self.state.begin_delete(id) {
                    debug!(uri = %self.uri, id = id, "delete refused");
                    return;
                }
                let source = Arc::clone(&self.source);
                let uri = self.uri.clone();
                self.inflight.push(Box::pin(async move {
                    Completion::Deleted(id, source.delete(&uri, id).await)
                }));
            },
        }
    }

    fn fetch(&mut self, req: PageRequest) {
        debug!(uri = %self.uri, seq = req.seq, page = req.page, "fetching page");
        let source = Arc::clone(&self.source);
        let uri = self.uri.clone();
        let query = req.query_pairs();
        let seq = req.seq;
        self.inflight.push(Box::pin(async move {
            let result = source
                .fetch_page(&uri, &query)
                .await
                .and_then(|body| serde_json::from_value(body).map_err(TableError::from));
            Completion::Page(seq, result)
        }));
    }

    fn complete(&mut self, done: Completion<R>) {
        let raised = self.state.notices_raised();
        match done {
            Completion::Page(seq, result) => {
                if let Err(err) = &result {
                    debug!(uri = %self.uri, seq = seq, error = %err, "page fetch failed");
                }
                if !self.state.apply_page(seq, result) {
                    debug!(uri = %self.uri, seq = seq, "discarded superseded page response");
                    return;
                }
            },
            Completion::Deleted(id, result) => {
                if let Err(err) = &result {
                    debug!(uri = %self.uri, id = id, error = %err, "delete failed");
                }
                self.state.apply_delete(id, result);
            },
        }
        if self.state.notice().is_none() {
            self.notice_until = None;
        } else if self.state.notices_raised() != raised {
            self.notice_until = Some(Instant::now() + self.options.notice_ttl);
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.state.view(&self.options.no_results_text));
    }
}
