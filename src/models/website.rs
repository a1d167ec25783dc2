use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Website {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub file: String, // Path relative to the media root
    pub submitted_at: NaiveDateTime,
    pub is_favorite: bool,
    pub date_site_of_the_day: Option<NaiveDate>,
}

/// A submission that has passed validation and whose thumbnail is stored.
#[derive(Debug, Clone)]
pub struct NewWebsite {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub file: String,
}

/// A website together with the mean of one of its review columns.
#[derive(Serialize, Debug, Clone)]
pub struct RatedWebsite {
    #[serde(flatten)]
    pub website: Website,
    pub score: Option<f64>,
    pub review_count: i64,
}
