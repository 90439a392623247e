use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{entities::{link, title, user}, table::TableRow};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    Movie,
    Series,
}

impl TitleType {
    pub fn as_str(self) -> &'static str {
        match self {
            TitleType::Movie => "movie",
            TitleType::Series => "series",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "movie" => Some(TitleType::Movie),
            "series" => Some(TitleType::Series),
            _ => None,
        }
    }
}

/// Query string accepted by every `/<entity>/paginate` endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    #[serde(rename = "perPage")]
    pub per_page: Option<u64>,
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub order: Option<String>,
}

impl PageQuery {
    /// Search text, ignoring blank input.
    pub fn search(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }

    /// Resolves `(page, per_page)`: pages are 1-based and `per_page` is clamped to `1..=max`.
    pub fn window(&self, default_per_page: u64, max_per_page: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(default_per_page).clamp(1, max_per_page.max(1));
        (page, per_page)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    #[serde(rename = "totalPages")]
    pub total_pages: f64,
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenBody {
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteReportedBody {
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
    pub reports: i32,
}

/// A value bound to one of a table's filter parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(i64),
}

impl ParamValue {
    pub fn to_query_value(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Number(n)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleRow {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub release_date: Option<String>,
    pub created_at: i64,
}

impl From<title::Model> for TitleRow {
    fn from(m: title::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            kind: m.kind,
            poster: m.poster,
            plot: m.plot,
            release_date: m.release_date,
            created_at: m.created_at,
        }
    }
}

impl TableRow for TitleRow {
    fn id(&self) -> i64 {
        self.id.into()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkTitleRef {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkRow {
    pub id: i32,
    pub provider: String,
    pub title: Option<LinkTitleRef>,
    pub upvote_count: i32,
    pub downvote_count: i32,
    pub flag_count: i32,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub url: String,
}

impl LinkRow {
    pub fn from_parts(m: link::Model, title: Option<title::Model>) -> Self {
        Self {
            id: m.id,
            provider: m.provider,
            title: title.map(|t| LinkTitleRef { id: t.id, title: t.title, kind: t.kind }),
            upvote_count: m.upvote_count,
            downvote_count: m.downvote_count,
            flag_count: m.flag_count,
            season: m.season,
            episode: m.episode,
            url: m.url,
        }
    }
}

impl TableRow for LinkRow {
    fn id(&self) -> i64 {
        self.id.into()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub avatar: Option<String>,
    pub activated: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
}

impl From<user::Model> for UserRow {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            gender: m.gender,
            avatar: m.avatar,
            activated: m.activated,
            last_login: m.last_login,
            created_at: m.created_at,
        }
    }
}

impl TableRow for UserRow {
    fn id(&self) -> i64 {
        self.id.into()
    }
}
