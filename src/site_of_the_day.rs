//! Backfill-on-read selection of the daily winner.
//!
//! Each home page view looks at the previous [`LOOKBACK_DAYS`] days. A day
//! with a recorded winner is returned as is. A day without one gets the
//! website whose reviews created that day have the highest mean average,
//! and the pairing is stored permanently. Days outside the window are never
//! revisited.
use chrono::{Duration, NaiveDate};
use log::{debug, info};
use rusqlite::{params, Connection, Error, OptionalExtension};
use serde::Serialize;

use crate::db::{query_website, Database};
use crate::models::Website;

pub const LOOKBACK_DAYS: i64 = 6;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SiteOfTheDay {
    pub day: NaiveDate,
    pub website: Website,
}

impl Database {
    /// Winners for `today - 1` back to `today - LOOKBACK_DAYS`, newest first.
    /// Days with no reviews are skipped.
    pub async fn recent_sites_of_the_day(&self, today: NaiveDate) -> Result<Vec<SiteOfTheDay>, Error> {
        let mut conn = self.lock().await;
        let mut sites = Vec::new();

        for offset in 1..=LOOKBACK_DAYS {
            let day = today - Duration::days(offset);

            if let Some(site) = recorded_winner(&conn, day)? {
                sites.push(site);
                continue;
            }

            let Some(website_id) = best_of_day(&conn, day)? else {
                debug!("[DB] No reviews on {}, no site of the day", day);
                continue;
            };

            record_winner(&mut conn, day, website_id)?;
            // Re-read so a concurrent writer that won the insert is what we report
            if let Some(site) = recorded_winner(&conn, day)? {
                sites.push(site);
            }
        }

        Ok(sites)
    }

    pub async fn site_of_the_day(&self, day: NaiveDate) -> Result<Option<SiteOfTheDay>, Error> {
        let conn = self.lock().await;
        recorded_winner(&conn, day)
    }
}

fn recorded_winner(conn: &Connection, day: NaiveDate) -> Result<Option<SiteOfTheDay>, Error> {
    let website_id: Option<i64> = conn
        .query_row(
            "SELECT website_id FROM site_of_the_day WHERE day = ?",
            [day],
            |row| row.get(0),
        )
        .optional()?;

    let Some(website_id) = website_id else {
        return Ok(None);
    };
    Ok(query_website(conn, website_id)?.map(|website| SiteOfTheDay { day, website }))
}

/// The website with the highest mean average over reviews created on `day`.
fn best_of_day(conn: &Connection, day: NaiveDate) -> Result<Option<i64>, Error> {
    conn.query_row(
        "SELECT website_id
         FROM reviews
         WHERE date(created_at) = ?
         GROUP BY website_id
         ORDER BY AVG(average) DESC, website_id ASC
         LIMIT 1",
        [day],
        |row| row.get(0),
    )
    .optional()
}

/// Stores the winner for `day` unless one already exists. The primary key on
/// `site_of_the_day.day` makes the losing side of a race a no-op.
fn record_winner(conn: &mut Connection, day: NaiveDate, website_id: i64) -> Result<(), Error> {
    let tx = conn.transaction()?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO site_of_the_day (day, website_id) VALUES (?, ?)",
        params![day, website_id],
    )?;
    if inserted > 0 {
        tx.execute(
            "UPDATE websites SET date_site_of_the_day = ? WHERE id = ?",
            params![day, website_id],
        )?;
        info!("[DB] Website {} is the site of the day for {}", website_id, day);
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::create_test_db;
    use crate::models::{NewReview, NewWebsite, Scores};
    use chrono::NaiveDateTime;

    fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
        day.and_hms_opt(hour, 0, 0).unwrap()
    }

    async fn website(db: &Database, owner: i64, title: &str) -> Website {
        db.insert_website(
            owner,
            &NewWebsite {
                title: title.into(),
                url: "https://example.com".into(),
                description: None,
                file: "uploads/websites/x.png".into(),
            },
        )
        .await
        .unwrap()
    }

    async fn review_at(db: &Database, website: i64, user: i64, s: (i64, i64, i64, i64), when: NaiveDateTime) {
        let scores = Scores::new(s.0, s.1, s.2, s.3).unwrap();
        db.insert_review(&NewReview::new(website, user, scores, None).created_at(when))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn picks_highest_same_day_mean_and_stamps_website() {
        let db = create_test_db().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today - Duration::days(1);

        let owner = db.get_or_create_user("owner").await.unwrap();
        let r1 = db.get_or_create_user("r1").await.unwrap();
        let r2 = db.get_or_create_user("r2").await.unwrap();
        let a = website(&db, owner.id, "A").await;
        let b = website(&db, owner.id, "B").await;

        // a: single 8.00; b: 8.75 and 4.00, mean 6.375
        review_at(&db, a.id, r1.id, (9, 9, 9, 5), at(yesterday, 9)).await;
        review_at(&db, b.id, r1.id, (10, 10, 10, 5), at(yesterday, 10)).await;
        review_at(&db, b.id, r2.id, (4, 4, 4, 4), at(yesterday, 11)).await;

        let sites = db.recent_sites_of_the_day(today).await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].day, yesterday);
        assert_eq!(sites[0].website.id, a.id);
        assert_eq!(sites[0].website.date_site_of_the_day, Some(yesterday));
    }

    #[tokio::test]
    async fn equal_means_go_to_lower_website_id() {
        let db = create_test_db().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today - Duration::days(1);

        let owner = db.get_or_create_user("owner").await.unwrap();
        let r1 = db.get_or_create_user("r1").await.unwrap();
        let a = website(&db, owner.id, "A").await;
        let b = website(&db, owner.id, "B").await;
        assert!(a.id < b.id);

        // b is reviewed first so insertion order would favour it
        review_at(&db, b.id, r1.id, (5, 5, 5, 5), at(yesterday, 8)).await;
        review_at(&db, a.id, r1.id, (5, 5, 5, 5), at(yesterday, 9)).await;

        let sites = db.recent_sites_of_the_day(today).await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].website.id, a.id);
    }

    #[tokio::test]
    async fn recorded_winner_never_changes() {
        let db = create_test_db().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let day = today - Duration::days(2);

        let owner = db.get_or_create_user("owner").await.unwrap();
        let r1 = db.get_or_create_user("r1").await.unwrap();
        let a = website(&db, owner.id, "A").await;
        let b = website(&db, owner.id, "B").await;

        review_at(&db, a.id, r1.id, (5, 5, 5, 1), at(day, 8)).await;
        let first = db.recent_sites_of_the_day(today).await.unwrap();
        assert_eq!(first[0].website.id, a.id);

        // A better review for the same day arrives afterwards
        review_at(&db, b.id, r1.id, (10, 10, 10, 5), at(day, 20)).await;
        let second = db.recent_sites_of_the_day(today).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].website.id, a.id);
        assert_eq!(db.get_website(b.id).await.unwrap().unwrap().date_site_of_the_day, None);
    }

    #[tokio::test]
    async fn window_is_six_days_and_excludes_today() {
        let db = create_test_db().await;
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let owner = db.get_or_create_user("owner").await.unwrap();
        let owner_site = website(&db, owner.id, "A").await;
        for (i, offset) in [0, 1, 6, 7].into_iter().enumerate() {
            let reviewer = db.get_or_create_user(&format!("r{i}")).await.unwrap();
            let when = at(today - Duration::days(offset), 12);
            review_at(&db, owner_site.id, reviewer.id, (5, 5, 5, 5), when).await;
        }

        let sites = db.recent_sites_of_the_day(today).await.unwrap();
        let days: Vec<_> = sites.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![today - Duration::days(1), today - Duration::days(6)]);
        assert!(db.site_of_the_day(today).await.unwrap().is_none());
        assert!(db.site_of_the_day(today - Duration::days(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn losing_insert_keeps_existing_winner() {
        let db = create_test_db().await;
        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let owner = db.get_or_create_user("owner").await.unwrap();
        let a = website(&db, owner.id, "A").await;
        let b = website(&db, owner.id, "B").await;

        {
            let mut conn = db.lock().await;
            record_winner(&mut conn, day, a.id).unwrap();
            record_winner(&mut conn, day, b.id).unwrap();
        }

        let winner = db.site_of_the_day(day).await.unwrap().unwrap();
        assert_eq!(winner.website.id, a.id);
        assert_eq!(db.get_website(b.id).await.unwrap().unwrap().date_site_of_the_day, None);
    }
}
