//! Ranked views over review aggregates.
//!
//! Every ranking uses an inner join against `reviews`, so websites without a
//! single review never appear. Equal scores fall back to the lower website id.
use log::debug;
use rusqlite::{Error, OptionalExtension};
use serde::Serialize;

use crate::db::{query_website, user_from_row, Database, REVIEW_COLUMNS, WEBSITE_COLUMNS};
use crate::models::{RatedWebsite, Review, User, Website};

pub const EXPLORE_LIMIT: usize = 5;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Average,
    Design,
    Usability,
    Content,
    Overall,
}

impl Metric {
    fn column(self) -> &'static str {
        match self {
            Metric::Average => "average",
            Metric::Design => "design",
            Metric::Usability => "usability",
            Metric::Content => "content",
            Metric::Overall => "overall",
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Explore {
    pub top_rated_projects: Vec<RatedWebsite>,
    pub highest_design: Vec<RatedWebsite>,
    pub highest_content: Vec<RatedWebsite>,
    pub highest_usability: Vec<RatedWebsite>,
}

/// The single best review on record, with what the home page shows about it.
#[derive(Serialize, Debug, Clone)]
pub struct HighlightedReview {
    pub review: Review,
    pub website: Website,
    pub owner: User,
}

impl HighlightedReview {
    pub fn formatted_date(&self) -> String {
        self.review.created_at.format("%b %d, %Y").to_string()
    }
}

impl Database {
    /// Websites ranked by the mean of `metric` over their reviews.
    pub async fn top_websites(&self, metric: Metric, limit: usize) -> Result<Vec<RatedWebsite>, Error> {
        let conn = self.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WEBSITE_COLUMNS}, AVG(r.{column}) AS score, COUNT(r.id) AS review_count
             FROM websites w
             JOIN reviews r ON r.website_id = w.id
             GROUP BY w.id
             ORDER BY score DESC, w.id ASC
             LIMIT ?",
            column = metric.column()
        ))?;
        let ranked = stmt
            .query_map([limit as i64], |row| RatedWebsite::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!("[DB] Ranked {} websites by {:?}", ranked.len(), metric);
        Ok(ranked)
    }

    pub async fn explore(&self, limit: usize) -> Result<Explore, Error> {
        Ok(Explore {
            top_rated_projects: self.top_websites(Metric::Average, limit).await?,
            highest_design: self.top_websites(Metric::Design, limit).await?,
            highest_content: self.top_websites(Metric::Content, limit).await?,
            highest_usability: self.top_websites(Metric::Usability, limit).await?,
        })
    }

    /// The review with the highest average; ties go to the earliest review id.
    pub async fn highest_rated_review(&self) -> Result<Option<HighlightedReview>, Error> {
        let conn = self.lock().await;
        let review = conn
            .query_row(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews r ORDER BY r.average DESC, r.id ASC LIMIT 1"),
                [],
                |row| Review::try_from(row),
            )
            .optional()?;
        let Some(review) = review else {
            return Ok(None);
        };

        let website = query_website(&conn, review.website_id)?.ok_or(Error::QueryReturnedNoRows)?;
        let owner = conn.query_row(
            "SELECT id, username FROM users WHERE id = ?",
            [website.user_id],
            user_from_row,
        )?;

        Ok(Some(HighlightedReview { review, website, owner }))
    }
}
