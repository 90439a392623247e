pub mod episode;
pub mod link;
pub mod link_scrape;
pub mod season;
pub mod title;
pub mod user;
