use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "titles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(column_name = "type")]
    pub kind: String,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub release_date: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub imdb_rating: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::season::Entity")]
    Season,
    #[sea_orm(has_many = "super::link::Entity")]
    Link,
    #[sea_orm(has_many = "super::link_scrape::Entity")]
    LinkScrape,
}

impl Related<super::season::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Season.def()
    }
}

impl Related<super::link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Link.def()
    }
}

impl Related<super::link_scrape::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LinkScrape.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
