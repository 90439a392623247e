use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use crate::{
    entities::{episode, link, link_scrape, season, title, user},
    error::AppResult,
    models::{LinkRow, PageQuery, PageResponse, TitleRow, TitleType, UserRow},
    scheduler::ScrapeStore,
};

#[derive(Clone)]
pub struct Catalog {
    db: DatabaseConnection,
    default_per_page: u64,
    max_per_page: u64,
}

impl Catalog {
    pub fn new(db: DatabaseConnection, default_per_page: u64, max_per_page: u64) -> Self {
        Self { db, default_per_page, max_per_page }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn paginate_titles(&self, q: &PageQuery) -> AppResult<PageResponse<TitleRow>> {
        let (page, per_page) = q.window(self.default_per_page, self.max_per_page);

        let mut select = title::Entity::find();
        if let Some(search) = q.search() {
            select = select.filter(title::Column::Title.contains(search));
        }
        if let Some(kind) = q.kind.as_deref().and_then(TitleType::from_code) {
            select = select.filter(title::Column::Kind.eq(kind.as_str()));
        }
        let select =
            select.order_by_desc(title::Column::CreatedAt).order_by_desc(title::Column::Id);

        let paginator = select.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = if past_last_page(page, per_page, total) {
            Vec::new()
        } else {
            paginator.fetch_page(page - 1).await?
        };

        debug!(page = page, per_page = per_page, total = total, "paginated titles");

        Ok(PageResponse {
            total_pages: total_pages(total, per_page),
            items: items.into_iter().map(TitleRow::from).collect(),
        })
    }

    pub async fn paginate_links(&self, q: &PageQuery) -> AppResult<PageResponse<LinkRow>> {
        let (page, per_page) = q.window(self.default_per_page, self.max_per_page);

        let mut select = link::Entity::find().find_also_related(title::Entity);
        if let Some(search) = q.search() {
            select = select.filter(
                Condition::any()
                    .add(link::Column::Url.contains(search))
                    .add(link::Column::Provider.contains(search))
                    .add(title::Column::Title.contains(search)),
            );
        }
        let select = match q.order() {
            Some("labelAsc") => select.order_by_asc(link::Column::Provider),
            Some("labelDesc") => select.order_by_desc(link::Column::Provider),
            _ => select.order_by_desc(link::Column::CreatedAt),
        }
        .order_by_desc(link::Column::Id);

        let paginator = select.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = if past_last_page(page, per_page, total) {
            Vec::new()
        } else {
            paginator.fetch_page(page - 1).await?
        };

        debug!(page = page, per_page = per_page, total = total, "paginated links");

        Ok(PageResponse {
            total_pages: total_pages(total, per_page),
            items: items.into_iter().map(|(l, t)| LinkRow::from_parts(l, t)).collect(),
        })
    }

    pub async fn paginate_users(&self, q: &PageQuery) -> AppResult<PageResponse<UserRow>> {
        let (page, per_page) = q.window(self.default_per_page, self.max_per_page);

        let mut select = user::Entity::find();
        if let Some(search) = q.search() {
            select = select.filter(
                Condition::any()
                    .add(user::Column::Username.contains(search))
                    .add(user::Column::Email.contains(search)),
            );
        }
        let select = match q.order() {
            Some("created_atAsc") => select.order_by_asc(user::Column::CreatedAt),
            Some("last_loginDesc") => select.order_by_desc(user::Column::LastLogin),
            Some("last_loginAsc") => select.order_by_asc(user::Column::LastLogin),
            _ => select.order_by_desc(user::Column::CreatedAt),
        }
        .order_by_desc(user::Column::Id);

        let paginator = select.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let items = if past_last_page(page, per_page, total) {
            Vec::new()
        } else {
            paginator.fetch_page(page - 1).await?
        };

        debug!(page = page, per_page = per_page, total = total, "paginated users");

        Ok(PageResponse {
            total_pages: total_pages(total, per_page),
            items: items.into_iter().map(UserRow::from).collect(),
        })
    }

    /// Deletes a title together with everything hanging off it. Returns `false` if no such title.
    pub async fn delete_title(&self, id: i32) -> AppResult<bool> {
        let txn = self.db.begin().await?;

        if title::Entity::find_by_id(id).one(&txn).await?.is_none() {
            return Ok(false);
        }

        episode::Entity::delete_many().filter(episode::Column::TitleId.eq(id)).exec(&txn).await?;
        season::Entity::delete_many().filter(season::Column::TitleId.eq(id)).exec(&txn).await?;
        link::Entity::delete_many().filter(link::Column::TitleId.eq(id)).exec(&txn).await?;
        link_scrape::Entity::delete_many()
            .filter(link_scrape::Column::TitleId.eq(id))
            .exec(&txn)
            .await?;
        title::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        debug!(title_id = id, "deleted title");
        Ok(true)
    }

    pub async fn delete_link(&self, id: i32) -> AppResult<bool> {
        let res = link::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn delete_user(&self, id: i32) -> AppResult<bool> {
        let res = user::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    /// Removes every link flagged at least `min_reports` times.
    pub async fn delete_reported_links(&self, min_reports: i32) -> AppResult<u64> {
        let res = link::Entity::delete_many()
            .filter(link::Column::FlagCount.gte(min_reports))
            .exec(&self.db)
            .await?;
        debug!(min_reports = min_reports, deleted = res.rows_affected, "deleted reported links");
        Ok(res.rows_affected)
    }
}

impl ScrapeStore for Catalog {
    async fn titles_page(&self, offset: u64, limit: u64) -> Result<Vec<title::Model>, DbErr> {
        title::Entity::find()
            .order_by_asc(title::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
    }

    async fn latest_scrape(&self, title_id: i32) -> Result<Option<link_scrape::Model>, DbErr> {
        link_scrape::Entity::find()
            .filter(link_scrape::Column::TitleId.eq(title_id))
            .order_by_desc(link_scrape::Column::StartedAt)
            .one(&self.db)
            .await
    }

    async fn enqueue_scrape(&self, provider: &str, title_id: i32) -> Result<i32, DbErr> {
        let model = link_scrape::ActiveModel {
            id: NotSet,
            provider: Set(provider.to_string()),
            title_id: Set(title_id),
            started_at: NotSet,
            ended_at: Set(None),
        };
        let res = link_scrape::Entity::insert(model).exec(&self.db).await?;
        Ok(res.last_insert_id)
    }
}

/// Pages beyond the last one are empty; this also keeps the row offset from overflowing.
fn past_last_page(page: u64, per_page: u64, total: u64) -> bool {
    page > total.div_ceil(per_page.max(1)).max(1)
}

fn total_pages(total: u64, per_page: u64) -> f64 {
    total as f64 / per_page.max(1) as f64
}

#[cfg(test)]
pub(crate) mod tests {
    use sea_orm::{ActiveModelTrait, Database};

    use super::*;

    pub(crate) async fn test_catalog() -> Catalog {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        <migration::Migrator as sea_orm_migration::MigratorTrait>::up(&db, None).await.unwrap();
        Catalog::new(db, 15, 100)
    }

    pub(crate) async fn seed_title(catalog: &Catalog, name: &str, kind: TitleType, at: i64) -> i32 {
        title::ActiveModel {
            id: NotSet,
            title: Set(name.to_string()),
            kind: Set(kind.as_str().to_string()),
            poster: Set(None),
            plot: Set(Some(format!("{name} plot"))),
            release_date: Set(Some("2008-07-18".to_string())),
            imdb_rating: Set(Some(8.1)),
            created_at: Set(at),
            updated_at: Set(at),
        }
        .insert(catalog.db())
        .await
        .unwrap()
        .id
    }

    pub(crate) async fn seed_link(catalog: &Catalog, title_id: i32, provider: &str, flags: i32) -> i32 {
        link::ActiveModel {
            id: NotSet,
            title_id: Set(title_id),
            provider: Set(provider.to_string()),
            url: Set(format!("https://{provider}.example/watch/{title_id}")),
            season: Set(None),
            episode: Set(None),
            upvote_count: Set(3),
            downvote_count: Set(1),
            flag_count: Set(flags),
            created_at: Set(1_700_000_000),
        }
        .insert(catalog.db())
        .await
        .unwrap()
        .id
    }

    pub(crate) async fn seed_user(catalog: &Catalog, username: &str, created_at: i64) -> i32 {
        user::ActiveModel {
            id: NotSet,
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            first_name: Set(None),
            last_name: Set(None),
            gender: Set(None),
            avatar: Set(None),
            activated: Set(true),
            last_login: Set(None),
            created_at: Set(created_at),
        }
        .insert(catalog.db())
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn paginate_titles_filters_by_type_and_query() {
        let catalog = test_catalog().await;
        seed_title(&catalog, "Batman Begins", TitleType::Movie, 1).await;
        seed_title(&catalog, "The Dark Knight", TitleType::Movie, 2).await;
        seed_title(&catalog, "Batman: The Animated Series", TitleType::Series, 3).await;

        let q = PageQuery { query: Some("batman".into()), ..Default::default() };
        let res = catalog.paginate_titles(&q).await.unwrap();
        assert_eq!(res.items.len(), 2);

        let q = PageQuery {
            query: Some("batman".into()),
            kind: Some("movie".into()),
            ..Default::default()
        };
        let res = catalog.paginate_titles(&q).await.unwrap();
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].title, "Batman Begins");
    }

    #[tokio::test]
    async fn paginate_titles_reports_fractional_total_pages() {
        let catalog = test_catalog().await;
        for i in 0..21 {
            seed_title(&catalog, &format!("Title {i}"), TitleType::Movie, i).await;
        }

        let q = PageQuery { page: Some(2), per_page: Some(5), ..Default::default() };
        let res = catalog.paginate_titles(&q).await.unwrap();

        assert_eq!(res.total_pages, 4.2);
        assert_eq!(res.items.len(), 5);
        // newest first, so page 2 starts at the sixth newest
        assert_eq!(res.items[0].title, "Title 15");

        let q = PageQuery { page: Some(5), per_page: Some(5), ..Default::default() };
        let res = catalog.paginate_titles(&q).await.unwrap();
        assert_eq!(res.items.len(), 1);
    }

    #[tokio::test]
    async fn paginate_beyond_last_page_is_empty() {
        let catalog = test_catalog().await;
        for i in 0..3 {
            seed_title(&catalog, &format!("Title {i}"), TitleType::Movie, i).await;
        }
        seed_user(&catalog, "alice", 1).await;

        let q = PageQuery { page: Some(u64::MAX), per_page: Some(100), ..Default::default() };
        let res = catalog.paginate_titles(&q).await.unwrap();
        assert!(res.items.is_empty());
        assert_eq!(res.total_pages, 0.03);

        let q = PageQuery { page: Some(2), per_page: Some(3), ..Default::default() };
        assert!(catalog.paginate_titles(&q).await.unwrap().items.is_empty());
        assert!(catalog.paginate_links(&q).await.unwrap().items.is_empty());
        assert!(catalog.paginate_users(&q).await.unwrap().items.is_empty());
    }

    #[test]
    fn past_last_page_bounds() {
        assert!(!past_last_page(1, 15, 0));
        assert!(past_last_page(2, 15, 0));
        assert!(!past_last_page(2, 5, 6));
        assert!(past_last_page(3, 5, 10));
        assert!(past_last_page(u64::MAX, 100, 3));
    }

    #[tokio::test]
    async fn paginate_links_joins_title_and_orders_by_label() {
        let catalog = test_catalog().await;
        let t = seed_title(&catalog, "Heat", TitleType::Movie, 1).await;
        seed_link(&catalog, t, "vidzi", 0).await;
        seed_link(&catalog, t, "allmyvideos", 0).await;

        let q = PageQuery { order: Some("labelAsc".into()), ..Default::default() };
        let res = catalog.paginate_links(&q).await.unwrap();

        assert_eq!(res.items.len(), 2);
        assert_eq!(res.items[0].provider, "allmyvideos");
        assert_eq!(res.items[0].title.as_ref().map(|t| t.title.as_str()), Some("Heat"));

        let q = PageQuery { query: Some("heat".into()), ..Default::default() };
        assert_eq!(catalog.paginate_links(&q).await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn paginate_users_searches_username_and_email() {
        let catalog = test_catalog().await;
        seed_user(&catalog, "alice", 10).await;
        seed_user(&catalog, "bob", 20).await;

        let res = catalog.paginate_users(&PageQuery::default()).await.unwrap();
        assert_eq!(res.items[0].username, "bob");

        let q = PageQuery { query: Some("alice@".into()), ..Default::default() };
        let res = catalog.paginate_users(&q).await.unwrap();
        assert_eq!(res.items.len(), 1);
        assert_eq!(res.items[0].username, "alice");
    }

    #[tokio::test]
    async fn delete_title_removes_dependents() {
        let catalog = test_catalog().await;
        let t = seed_title(&catalog, "Heat", TitleType::Movie, 1).await;
        seed_link(&catalog, t, "vidzi", 0).await;
        catalog.enqueue_scrape("putlocker", t).await.unwrap();

        assert!(catalog.delete_title(t).await.unwrap());
        assert!(!catalog.delete_title(t).await.unwrap());
        assert!(catalog.latest_scrape(t).await.unwrap().is_none());
        assert!(catalog.paginate_links(&PageQuery::default()).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn delete_reported_links_uses_threshold() {
        let catalog = test_catalog().await;
        let t = seed_title(&catalog, "Heat", TitleType::Movie, 1).await;
        seed_link(&catalog, t, "a", 0).await;
        seed_link(&catalog, t, "b", 10).await;
        seed_link(&catalog, t, "c", 25).await;

        assert_eq!(catalog.delete_reported_links(10).await.unwrap(), 2);
        let left = catalog.paginate_links(&PageQuery::default()).await.unwrap();
        assert_eq!(left.items.len(), 1);
        assert_eq!(left.items[0].provider, "a");
    }

    #[tokio::test]
    async fn enqueue_scrape_lets_storage_stamp_started_at() {
        let catalog = test_catalog().await;
        let t = seed_title(&catalog, "Heat", TitleType::Movie, 1).await;

        catalog.enqueue_scrape("putlocker", t).await.unwrap();
        let job = catalog.latest_scrape(t).await.unwrap().unwrap();

        assert_eq!(job.provider, "putlocker");
        assert!(job.started_at > 0);
        assert!(job.ended_at.is_none());
    }
}
