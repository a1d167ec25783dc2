//! Read-only per-user reporting.
use chrono::{Datelike, NaiveDateTime, Timelike};
use rusqlite::{Error, OptionalExtension};
use serde::Serialize;

use crate::db::{Database, REVIEW_COLUMNS, WEBSITE_COLUMNS};
use crate::models::{Review, User, Website};

pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
pub const RECENT_PROJECTS: usize = 4;
pub const RECENT_SUBMISSIONS: usize = 2;
const NO_FEEDBACK: &str = "No feedback available yet.";
const NO_TIPS: &str = "No improvement tips available yet.";

/// Chart series; months without reviews are left out.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlyActivity {
    pub labels: Vec<&'static str>,
    pub data: Vec<i64>,
}

/// Builds the chart series from (month 1..=12, count) pairs.
pub fn monthly_activity(counts: &[(u32, i64)]) -> MonthlyActivity {
    let mut buckets = [0i64; 12];
    for &(month, count) in counts {
        if (1..=12).contains(&month) {
            buckets[(month - 1) as usize] += count;
        }
    }

    let mut series = MonthlyActivity::default();
    for (label, count) in MONTHS.iter().zip(buckets) {
        if count > 0 {
            series.labels.push(*label);
            series.data.push(count);
        }
    }
    series
}

pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..=11 => "Good Morning",
        12..=17 => "Good Afternoon",
        _ => "Good Evening",
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Feedback {
    pub text: String,
    pub website_id: Option<i64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Dashboard {
    pub greeting: &'static str,
    pub total_projects: i64,
    pub reviewed_projects_count: i64,
    pub non_reviewed_projects_count: i64,
    pub average_review_score: f64,
    pub recent_projects: Vec<Website>,
    pub recent_submissions: Vec<Website>,
    pub top_feedback: Feedback,
    pub improvement_tip: Feedback,
    pub activity: MonthlyActivity,
}

#[derive(Serialize, Debug, Clone)]
pub struct WebsiteDetail {
    pub website: Website,
    pub reviews: Vec<Review>,
    pub total_reviews: usize,
    pub overall_rating: f64,
    pub is_submitted_by_user: bool,
    pub has_user_reviewed: bool,
}

impl Database {
    pub async fn dashboard(&self, user: &User, now: NaiveDateTime) -> Result<Dashboard, Error> {
        let conn = self.lock().await;

        let (total_projects, reviewed_projects_count): (i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE EXISTS (SELECT 1 FROM reviews r WHERE r.website_id = w.id))
             FROM websites w
             WHERE w.user_id = ?",
            [user.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let average_overall: Option<f64> = conn.query_row(
            "SELECT AVG(r.overall)
             FROM reviews r
             JOIN websites w ON w.id = r.website_id
             WHERE w.user_id = ?",
            [user.id],
            |row| row.get(0),
        )?;

        let recent_projects = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WEBSITE_COLUMNS} FROM websites w
                 WHERE w.user_id = ?
                 ORDER BY w.submitted_at DESC, w.id DESC
                 LIMIT ?"
            ))?;
            let rows = stmt.query_map([user.id, RECENT_PROJECTS as i64], |row| Website::try_from(row))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let received = |order: &str| -> Result<Option<Review>, Error> {
            conn.query_row(
                &format!(
                    "SELECT {REVIEW_COLUMNS}
                     FROM reviews r
                     JOIN websites w ON w.id = r.website_id
                     WHERE w.user_id = ?
                     ORDER BY r.average {order}, r.id ASC
                     LIMIT 1"
                ),
                [user.id],
                |row| Review::try_from(row),
            )
            .optional()
        };
        let top_feedback = feedback(received("DESC")?, NO_FEEDBACK);
        let improvement_tip = feedback(received("ASC")?, NO_TIPS);

        let counts = {
            let mut stmt = conn.prepare(
                "SELECT CAST(strftime('%m', created_at) AS INTEGER) AS month, COUNT(*)
                 FROM reviews
                 WHERE user_id = ? AND strftime('%Y', created_at) = ?
                 GROUP BY month",
            )?;
            let rows = stmt.query_map(rusqlite::params![user.id, format!("{:04}", now.year())], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let recent_submissions = recent_projects.iter().take(RECENT_SUBMISSIONS).cloned().collect();

        Ok(Dashboard {
            greeting: greeting(now.hour()),
            total_projects,
            reviewed_projects_count,
            non_reviewed_projects_count: total_projects - reviewed_projects_count,
            average_review_score: round_to(average_overall.unwrap_or(0.0), 1),
            recent_projects,
            recent_submissions,
            top_feedback,
            improvement_tip,
            activity: monthly_activity(&counts),
        })
    }

    /// Detail view of one website as seen by `viewer`.
    pub async fn website_detail(&self, website: Website, viewer: &User) -> Result<WebsiteDetail, Error> {
        let reviews = self.reviews_for_website(website.id).await?;
        let has_user_reviewed = reviews.iter().any(|r| r.user_id == viewer.id);
        let overall_rating = if reviews.is_empty() {
            0.0
        } else {
            let sum: u32 = reviews.iter().map(|r| u32::from(r.scores.overall())).sum();
            f64::from(sum) / reviews.len() as f64
        };

        Ok(WebsiteDetail {
            is_submitted_by_user: website.user_id == viewer.id,
            total_reviews: reviews.len(),
            overall_rating,
            has_user_reviewed,
            reviews,
            website,
        })
    }
}

fn feedback(review: Option<Review>, fallback: &str) -> Feedback {
    match review {
        Some(review) => Feedback {
            text: review.description.unwrap_or_else(|| fallback.to_string()),
            website_id: Some(review.website_id),
        },
        None => Feedback {
            text: fallback.to_string(),
            website_id: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::create_test_db;
    use crate::models::{NewReview, NewWebsite, Scores};
    use chrono::NaiveDate;

    #[test]
    fn monthly_activity_drops_empty_months() {
        let series = monthly_activity(&[(3, 2), (1, 1), (12, 4)]);
        assert_eq!(series.labels, vec!["Jan", "Mar", "Dec"]);
        assert_eq!(series.data, vec![1, 2, 4]);
        assert_eq!(monthly_activity(&[]), MonthlyActivity::default());
    }

    #[test]
    fn greeting_by_hour() {
        assert_eq!(greeting(0), "Good Morning");
        assert_eq!(greeting(11), "Good Morning");
        assert_eq!(greeting(12), "Good Afternoon");
        assert_eq!(greeting(17), "Good Afternoon");
        assert_eq!(greeting(18), "Good Evening");
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

    #[tokio::test]
    async fn empty_dashboard_uses_fallbacks() {
        let db = create_test_db().await;
        let user = db.get_or_create_user("new").await.unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();

        let dashboard = db.dashboard(&user, now).await.unwrap();
        assert_eq!(dashboard.total_projects, 0);
        assert_eq!(dashboard.average_review_score, 0.0);
        assert_eq!(dashboard.top_feedback.text, NO_FEEDBACK);
        assert_eq!(dashboard.improvement_tip.website_id, None);
        assert!(dashboard.activity.labels.is_empty());
        assert!(dashboard.recent_submissions.is_empty());
        assert_eq!(dashboard.greeting, "Good Morning");
    }

    #[tokio::test]
    async fn dashboard_counts_and_feedback() {
        let db = create_test_db().await;
        let owner = db.get_or_create_user("owner").await.unwrap();
        let critic = db.get_or_create_user("critic").await.unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap().and_hms_opt(19, 0, 0).unwrap();

        let loved = website(&db, owner.id, "Loved").await;
        let meh = website(&db, owner.id, "Meh").await;
        website(&db, owner.id, "Unseen").await;
        let other = website(&db, critic.id, "Critic's").await;

        let at = |m: u32, d: u32| NaiveDate::from_ymd_opt(2026, m, d).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let review = |website: i64, user: i64, s: (i64, i64, i64, i64), text: &str| {
            NewReview::new(website, user, Scores::new(s.0, s.1, s.2, s.3).unwrap(), Some(text.into()))
        };

        db.insert_review(&review(loved.id, critic.id, (10, 10, 10, 5), "Superb").created_at(at(2, 1)))
            .await
            .unwrap();
        db.insert_review(&review(meh.id, critic.id, (2, 2, 2, 2), "Needs contrast").created_at(at(2, 3)))
            .await
            .unwrap();
        // Authored by the owner: counted in their activity, not in received feedback
        db.insert_review(&review(other.id, owner.id, (5, 5, 5, 3), "Fine").created_at(at(4, 9)))
            .await
            .unwrap();
        let last_year = NaiveDate::from_ymd_opt(2025, 4, 9).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let third = db.get_or_create_user("third").await.unwrap();
        let old = website(&db, third.id, "Old").await;
        db.insert_review(&review(old.id, owner.id, (5, 5, 5, 3), "Old").created_at(last_year))
            .await
            .unwrap();

        let dashboard = db.dashboard(&owner, now).await.unwrap();
        assert_eq!(dashboard.total_projects, 3);
        assert_eq!(dashboard.reviewed_projects_count, 2);
        assert_eq!(dashboard.non_reviewed_projects_count, 1);
        assert_eq!(dashboard.average_review_score, 3.5);
        assert_eq!(dashboard.recent_projects.len(), 3);
        let newest: Vec<_> = dashboard.recent_submissions.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(newest, vec!["Unseen", "Meh"]);
        assert_eq!(dashboard.top_feedback.text, "Superb");
        assert_eq!(dashboard.top_feedback.website_id, Some(loved.id));
        assert_eq!(dashboard.improvement_tip.text, "Needs contrast");
        assert_eq!(dashboard.improvement_tip.website_id, Some(meh.id));
        assert_eq!(dashboard.activity.labels, vec!["Apr"]);
        assert_eq!(dashboard.activity.data, vec![1]);
        assert_eq!(dashboard.greeting, "Good Evening");
    }

    #[tokio::test]
    async fn website_detail_flags() {
        let db = create_test_db().await;
        let owner = db.get_or_create_user("owner").await.unwrap();
        let critic = db.get_or_create_user("critic").await.unwrap();
        let site = website(&db, owner.id, "Site").await;

        let detail = db.website_detail(site.clone(), &owner).await.unwrap();
        assert!(detail.is_submitted_by_user);
        assert_eq!(detail.overall_rating, 0.0);

        let scores = Scores::new(7, 7, 7, 4).unwrap();
        db.insert_review(&NewReview::new(site.id, critic.id, scores, None)).await.unwrap();
        let detail = db.website_detail(site, &critic).await.unwrap();
        assert!(!detail.is_submitted_by_user);
        assert!(detail.has_user_reviewed);
        assert_eq!(detail.total_reviews, 1);
        assert_eq!(detail.overall_rating, 4.0);
    }
}
