use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LinkScrapes::Table)
                    .if_not_exists()
                    .col(pk_auto(LinkScrapes::Id))
                    .col(string(LinkScrapes::Provider))
                    .col(integer(LinkScrapes::TitleId))
                    // started_at is stamped by storage on insert
                    .col(
                        big_integer(LinkScrapes::StartedAt)
                            .default(Expr::cust("(CAST(strftime('%s','now') AS INTEGER))")),
                    )
                    .col(big_integer_null(LinkScrapes::EndedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_link_scrapes_title_started")
                    .table(LinkScrapes::Table)
                    .col(LinkScrapes::TitleId)
                    .col(LinkScrapes::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_link_scrapes_title_started")
                    .table(LinkScrapes::Table)
                    .to_owned(),
            )
            .await?;
        manager.drop_table(Table::drop().table(LinkScrapes::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum LinkScrapes {
    Table,
    Id,
    Provider,
    TitleId,
    StartedAt,
    EndedAt,
}
