use serde::Serialize;

use super::{TableError, TableRow};
use crate::models::{PageResponse, ParamValue, Params};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Phase {
    Idle,
    Loading,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// One fetch issued against the paginate endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub seq: u64,
    pub page: u64,
    pub per_page: u64,
    pub params: Params,
}

impl PageRequest {
    /// Query pairs in wire form. The anti-forgery token is added by the page source.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("perPage".to_string(), self.per_page.to_string()),
        ];
        pairs.extend(self.params.iter().map(|(k, v)| (k.clone(), v.to_query_value())));
        pairs
    }
}

/// Snapshot handed to the view layer after every change.
#[derive(Clone, Debug, Serialize)]
pub struct TableView<R> {
    pub rows: Vec<R>,
    pub current_page: u64,
    pub total_pages: u64,
    pub per_page: u64,
    pub params: Params,
    pub phase: Phase,
    pub locked: bool,
    pub has_next: bool,
    pub has_previous: bool,
    pub placeholder: Option<String>,
    pub notice: Option<Notice>,
    pub seq: u64,
}

#[derive(Debug)]
pub struct TableState<R> {
    current_page: u64,
    total_pages: u64,
    per_page: u64,
    params: Params,
    staged: Params,
    cleared: Vec<String>,
    rows: Vec<R>,
    phase: Phase,
    latest_seq: u64,
    empty_result: bool,
    deleting: Option<i64>,
    notice: Option<Notice>,
    /// Bumped every time a notice is raised.
    notices_raised: u64,
}

impl<R: TableRow> TableState<R> {
    pub fn new(per_page: u64) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            per_page: per_page.max(1),
            params: Params::new(),
            staged: Params::new(),
            cleared: Vec::new(),
            rows: Vec::new(),
            phase: Phase::Idle,
            latest_seq: 0,
            empty_result: false,
            deleting: None,
            notice: None,
            notices_raised: 0,
        }
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn notices_raised(&self) -> u64 {
        self.notices_raised
    }

    pub fn has_next(&self) -> bool {
        has_next(self.current_page, self.total_pages)
    }

    pub fn has_previous(&self) -> bool {
        has_previous(self.current_page)
    }

    /// Loading a page or waiting on a delete. Navigation and deletes are refused while locked.
    pub fn locked(&self) -> bool {
        self.phase == Phase::Loading || self.deleting.is_some()
    }

    /// Issues a fetch for the current page, superseding any fetch still in flight.
    pub fn begin_fetch(&mut self) -> PageRequest {
        self.latest_seq += 1;
        self.phase = Phase::Loading;
        PageRequest {
            seq: self.latest_seq,
            page: self.current_page,
            per_page: self.per_page,
            params: self.params.clone(),
        }
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        if self.locked() || !self.has_next() {
            return None;
        }
        self.current_page += 1;
        Some(self.begin_fetch())
    }

    pub fn previous_page(&mut self) -> Option<PageRequest> {
        if self.locked() || !self.has_previous() {
            return None;
        }
        self.current_page -= 1;
        Some(self.begin_fetch())
    }

    pub fn set_per_page(&mut self, per_page: u64) {
        self.per_page = per_page.max(1);
    }

    /// Records a filter change. It takes effect on the next [`Self::settle_filters`].
    pub fn stage_param(&mut self, name: impl Into<String>, value: Option<ParamValue>) {
        let name = name.into();
        match value {
            Some(value) => {
                self.cleared.retain(|n| *n != name);
                self.staged.insert(name, value);
            },
            None => {
                self.staged.remove(&name);
                if !self.cleared.contains(&name) {
                    self.cleared.push(name);
                }
            },
        }
    }

    /// Applies staged filter changes, returns to page 1 and fetches.
    pub fn settle_filters(&mut self) -> PageRequest {
        for name in self.cleared.drain(..) {
            self.params.remove(&name);
        }
        self.params.append(&mut self.staged);
        self.current_page = 1;
        self.begin_fetch()
    }

    /// Applies a page response. Returns `false` when the response belongs to a
    /// superseded request and was dropped.
    pub fn apply_page(&mut self, seq: u64, result: Result<PageResponse<R>, TableError>) -> bool {
        if seq != self.latest_seq {
            return false;
        }
        self.phase = Phase::Idle;
        match result {
            Ok(page) => {
                self.total_pages = round_total_pages(page.total_pages);
                self.empty_result = page.items.is_empty();
                self.rows = page.items;
                if self.notice.as_ref().is_some_and(|n| n.kind == NoticeKind::Error) {
                    self.notice = None;
                }
            },
            Err(err) => self.raise(NoticeKind::Error, err.to_string()),
        }
        true
    }

    /// Marks a visible row as being deleted. Returns `false` when locked or the row is not shown.
    pub fn begin_delete(&mut self, id: i64) -> bool {
        if self.locked() || !self.rows.iter().any(|r| r.id() == id) {
            return false;
        }
        self.deleting = Some(id);
        true
    }

    pub fn apply_delete(&mut self, id: i64, result: Result<String, TableError>) {
        if self.deleting == Some(id) {
            self.deleting = None;
        }
        match result {
            Ok(message) => {
                self.rows.retain(|r| r.id() != id);
                self.raise(NoticeKind::Success, message);
            },
            Err(err) => self.raise(NoticeKind::Error, err.to_string()),
        }
    }

    fn raise(&mut self, kind: NoticeKind, message: String) {
        self.notice = Some(Notice { kind, message });
        self.notices_raised += 1;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn view(&self, no_results_text: &str) -> TableView<R> {
        TableView {
            rows: self.rows.clone(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            per_page: self.per_page,
            params: self.params.clone(),
            phase: self.phase,
            locked: self.locked(),
            has_next: self.has_next(),
            has_previous: self.has_previous(),
            placeholder: (self.empty_result && self.phase == Phase::Idle)
                .then(|| no_results_text.to_string()),
            notice: self.notice.clone(),
            seq: self.latest_seq,
        }
    }
}

pub fn has_next(current_page: u64, total_pages: u64) -> bool {
    total_pages > 0 && current_page != total_pages
}

pub fn has_previous(current_page: u64) -> bool {
    current_page >= 2
}

/// The endpoint may report a fractional page count; anything partial is a page.
fn round_total_pages(total: f64) -> u64 {
    if total.is_finite() && total > 0.0 { total.ceil() as u64 } else { 0 }
}
