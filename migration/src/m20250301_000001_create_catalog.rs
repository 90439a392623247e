use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Titles::Table)
                    .if_not_exists()
                    .col(pk_auto(Titles::Id))
                    .col(string(Titles::Title))
                    .col(string(Titles::Type))
                    .col(string_null(Titles::Poster))
                    .col(text_null(Titles::Plot))
                    .col(string_null(Titles::ReleaseDate))
                    .col(double_null(Titles::ImdbRating))
                    .col(big_integer(Titles::CreatedAt))
                    .col(big_integer(Titles::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_titles_type")
                    .table(Titles::Table)
                    .col(Titles::Type)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Seasons::Table)
                    .if_not_exists()
                    .col(pk_auto(Seasons::Id))
                    .col(integer(Seasons::TitleId))
                    .col(integer(Seasons::Number))
                    .col(string_null(Seasons::ReleaseDate))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_seasons_title_number")
                    .table(Seasons::Table)
                    .col(Seasons::TitleId)
                    .col(Seasons::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Episodes::Table)
                    .if_not_exists()
                    .col(pk_auto(Episodes::Id))
                    .col(integer(Episodes::SeasonId))
                    .col(integer(Episodes::TitleId))
                    .col(integer(Episodes::SeasonNumber))
                    .col(integer(Episodes::EpisodeNumber))
                    .col(string_null(Episodes::Title))
                    .col(text_null(Episodes::Plot))
                    .col(string_null(Episodes::ReleaseDate))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_episodes_title")
                    .table(Episodes::Table)
                    .col(Episodes::TitleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(pk_auto(Links::Id))
                    .col(integer(Links::TitleId))
                    .col(string(Links::Provider))
                    .col(string(Links::Url))
                    .col(integer_null(Links::Season))
                    .col(integer_null(Links::Episode))
                    .col(integer(Links::UpvoteCount).default(0))
                    .col(integer(Links::DownvoteCount).default(0))
                    .col(integer(Links::FlagCount).default(0))
                    .col(big_integer(Links::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_links_title")
                    .table(Links::Table)
                    .col(Links::TitleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username))
                    .col(string(Users::Email))
                    .col(string_null(Users::FirstName))
                    .col(string_null(Users::LastName))
                    .col(string_null(Users::Gender))
                    .col(string_null(Users::Avatar))
                    .col(boolean(Users::Activated).default(false))
                    .col(big_integer_null(Users::LastLogin))
                    .col(big_integer(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Links::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Episodes::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Seasons::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Titles::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Titles {
    Table,
    Id,
    Title,
    Type,
    Poster,
    Plot,
    ReleaseDate,
    ImdbRating,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Seasons {
    Table,
    Id,
    TitleId,
    Number,
    ReleaseDate,
}

#[derive(DeriveIden)]
enum Episodes {
    Table,
    Id,
    SeasonId,
    TitleId,
    SeasonNumber,
    EpisodeNumber,
    Title,
    Plot,
    ReleaseDate,
}

#[derive(DeriveIden)]
enum Links {
    Table,
    Id,
    TitleId,
    Provider,
    Url,
    Season,
    Episode,
    UpvoteCount,
    DownvoteCount,
    FlagCount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    Gender,
    Avatar,
    Activated,
    LastLogin,
    CreatedAt,
}
