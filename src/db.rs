use crate::models::review::{normalize_description, stored_scores};
use crate::models::{
    Average, ContactMessage, NewReview, NewWebsite, Profile, ProfileUpdate, RatedWebsite, Review,
    Scores, User, Website,
};
use chrono::Utc;
use log::{debug, error};
use rusqlite::{params, Connection, Error, OptionalExtension, Row};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};


pub(crate) const WEBSITE_COLUMNS: &str = "w.id AS id, w.user_id AS user_id, w.title AS title, \
     w.url AS url, w.description AS description, w.file AS file, \
     w.submitted_at AS submitted_at, w.is_favorite AS is_favorite, \
     w.date_site_of_the_day AS date_site_of_the_day";

pub(crate) const REVIEW_COLUMNS: &str = "r.id AS id, r.website_id AS website_id, \
     r.user_id AS user_id, r.design AS design, r.usability AS usability, \
     r.content AS content, r.overall AS overall, r.average AS average, \
     r.description AS description, r.created_at AS created_at";

impl<'a> TryFrom<&'a Row<'a>> for Website {
    type Error = Error;

    fn try_from(row: &'a Row<'a>) -> Result<Self, Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            url: row.get("url")?,
            description: row.get("description")?,
            file: row.get("file")?,
            submitted_at: row.get("submitted_at")?,
            is_favorite: row.get("is_favorite")?,
            date_site_of_the_day: row.get("date_site_of_the_day")?,
        })
    }
}

impl<'a> TryFrom<&'a Row<'a>> for Review {
    type Error = Error;

    fn try_from(row: &'a Row<'a>) -> Result<Self, Error> {
        let scores = stored_scores(
            row.get("design")?,
            row.get("usability")?,
            row.get("content")?,
            row.get("overall")?,
        );
        Ok(Review::from_parts(
            row.get("id")?,
            row.get("website_id")?,
            row.get("user_id")?,
            scores,
            Average::from_f64(row.get("average")?),
            row.get("description")?,
            row.get("created_at")?,
        ))
    }
}

impl<'a> TryFrom<&'a Row<'a>> for RatedWebsite {
    type Error = Error;

    fn try_from(row: &'a Row<'a>) -> Result<Self, Error> {
        Ok(Self {
            website: Website::try_from(row)?,
            score: row.get("score")?,
            review_count: row.get("review_count")?,
        })
    }
}

impl<'a> TryFrom<&'a Row<'a>> for Profile {
    type Error = Error;

    fn try_from(row: &'a Row<'a>) -> Result<Self, Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            bio: row.get("bio")?,
            location: row.get("location")?,
            profession: row.get("profession")?,
            contact_info: row.get("contact_info")?,
            github: row.get("github")?,
            linkedin: row.get("linkedin")?,
            twitter: row.get("twitter")?,
            facebook: row.get("facebook")?,
            instagram: row.get("instagram")?,
        })
    }
}

pub(crate) fn user_from_row(row: &Row) -> Result<User, Error> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
    })
}

/// SQLite-backed store shared by every request handler.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    // Create a new database connection
    pub fn new(db_path: &str) -> Result<Self, Error> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!("[DB] Connection established at: {}", db_path);
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    // Create the database schema
    pub async fn create_schema(&self) -> Result<(), Error> {
        let conn = self.conn.lock().await;

        // 1. Users and their profiles
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                date_joined TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE,
                bio TEXT,
                location TEXT,
                profession TEXT,
                contact_info TEXT,
                github TEXT,
                linkedin TEXT,
                twitter TEXT,
                facebook TEXT,
                instagram TEXT,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );",
        )
        .map_err(|e| {
            error!("Failed creating users/profiles tables: {}", e);
            e
        })?;

        // 2. Submitted websites
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS websites (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                file TEXT NOT NULL,
                submitted_at TIMESTAMP NOT NULL,
                is_favorite BOOLEAN NOT NULL DEFAULT 0,
                date_site_of_the_day DATE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS websites_user ON websites(user_id);",
        )
        .map_err(|e| {
            error!("Failed creating websites table: {}", e);
            e
        })?;

        // 3. Reviews, one per (website, reviewer)
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY,
                website_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                design INTEGER NOT NULL CHECK (design BETWEEN 1 AND 10),
                usability INTEGER NOT NULL CHECK (usability BETWEEN 1 AND 10),
                content INTEGER NOT NULL CHECK (content BETWEEN 1 AND 10),
                overall INTEGER NOT NULL CHECK (overall BETWEEN 1 AND 5),
                average REAL NOT NULL,
                description TEXT,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (website_id, user_id),
                FOREIGN KEY (website_id) REFERENCES websites(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS reviews_created_at ON reviews(created_at);",
        )
        .map_err(|e| {
            error!("Failed creating reviews table: {}", e);
            e
        })?;

        // 4. One winner per calendar day
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS site_of_the_day (
                day DATE PRIMARY KEY,
                website_id INTEGER NOT NULL,
                FOREIGN KEY (website_id) REFERENCES websites(id) ON DELETE CASCADE
            );",
        )
        .map_err(|e| {
            error!("Failed creating site_of_the_day table: {}", e);
            e
        })?;

        // 5. Contact form messages
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .map_err(|e| {
            error!("Failed creating contacts table: {}", e);
            e
        })?;
        Ok(())
    }

    /// Returns the user with `username`, inserting it on first sight.
    pub async fn get_or_create_user(&self, username: &str) -> Result<User, Error> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        // Use INSERT OR IGNORE to handle users we have already seen
        let inserted = tx.execute("INSERT OR IGNORE INTO users (username) VALUES (?)", [username])?;
        let user = tx.query_row(
            "SELECT id, username FROM users WHERE username = ?",
            [username],
            user_from_row,
        )?;

        tx.commit()?;
        if inserted > 0 {
            debug!("[DB] Provisioned user {} (ID: {})", user.username, user.id);
        }
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, username FROM users WHERE username = ?",
            [username],
            user_from_row,
        )
        .optional()
    }

    pub async fn insert_website(&self, user_id: i64, website: &NewWebsite) -> Result<Website, Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO websites (user_id, title, url, description, file, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                user_id,
                website.title,
                website.url,
                website.description,
                website.file,
                Utc::now().naive_utc()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("[DB] Website {} submitted by user {}", id, user_id);

        query_website(&conn, id)?.ok_or(Error::QueryReturnedNoRows)
    }

    pub async fn get_website(&self, website_id: i64) -> Result<Option<Website>, Error> {
        let conn = self.conn.lock().await;
        query_website(&conn, website_id)
    }

    /// Lists websites, optionally restricted to an owner and/or favorite flag.
    pub async fn list_websites(
        &self,
        user_id: Option<i64>,
        is_favorite: Option<bool>,
    ) -> Result<Vec<Website>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WEBSITE_COLUMNS}
             FROM websites w
             WHERE (?1 IS NULL OR w.user_id = ?1)
               AND (?2 IS NULL OR w.is_favorite = ?2)
             ORDER BY w.id ASC"
        ))?;
        let websites = stmt
            .query_map(params![user_id, is_favorite], |row| Website::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(websites)
    }

    /// A user's websites, newest first, each with the mean `overall` of its reviews.
    pub async fn websites_with_overall(
        &self,
        user_id: i64,
        favorites_only: bool,
    ) -> Result<Vec<RatedWebsite>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WEBSITE_COLUMNS}, AVG(r.overall) AS score, COUNT(r.id) AS review_count
             FROM websites w
             LEFT JOIN reviews r ON r.website_id = w.id
             WHERE w.user_id = ?1 AND (?2 = 0 OR w.is_favorite = 1)
             GROUP BY w.id
             ORDER BY w.submitted_at DESC, w.id DESC"
        ))?;
        let websites = stmt
            .query_map(params![user_id, favorites_only], |row| RatedWebsite::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(websites)
    }

    /// Flips the favorite flag, returning the new value or `None` for an unknown id.
    pub async fn toggle_favorite(&self, website_id: i64) -> Result<Option<bool>, Error> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE websites SET is_favorite = NOT is_favorite WHERE id = ?",
            [website_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let is_favorite = conn.query_row(
            "SELECT is_favorite FROM websites WHERE id = ?",
            [website_id],
            |row| row.get(0),
        )?;
        debug!("[DB] Website {} favorite -> {}", website_id, is_favorite);
        Ok(Some(is_favorite))
    }

    /// Writes a review; the stored average always comes from its scores.
    pub async fn insert_review(&self, review: &NewReview) -> Result<Review, Error> {
        let conn = self.conn.lock().await;
        let scores = review.scores;
        conn.execute(
            "INSERT INTO reviews (website_id, user_id, design, usability, content, overall,
                                  average, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                review.website_id,
                review.user_id,
                scores.design(),
                scores.usability(),
                scores.content(),
                scores.overall(),
                review.average().as_f64(),
                review.description,
                review.created_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(
            "[DB] Review {} stored for website {} (average {})",
            id,
            review.website_id,
            review.average()
        );
        query_review(&conn, id)?.ok_or(Error::QueryReturnedNoRows)
    }

    /// Replaces a review's scores and description, recomputing its average.
    pub async fn update_review(
        &self,
        review_id: i64,
        scores: Scores,
        description: Option<String>,
    ) -> Result<Option<Review>, Error> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE reviews
             SET design = ?, usability = ?, content = ?, overall = ?, average = ?, description = ?
             WHERE id = ?",
            params![
                scores.design(),
                scores.usability(),
                scores.content(),
                scores.overall(),
                scores.average().as_f64(),
                normalize_description(description),
                review_id
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        debug!("[DB] Review {} updated (average {})", review_id, scores.average());
        query_review(&conn, review_id)
    }

    pub async fn get_review(&self, review_id: i64) -> Result<Option<Review>, Error> {
        let conn = self.conn.lock().await;
        query_review(&conn, review_id)
    }

    pub async fn has_reviewed(&self, website_id: i64, user_id: i64) -> Result<bool, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT 1 FROM reviews WHERE website_id = ? AND user_id = ?")?;
        let exists = stmt.exists(params![website_id, user_id])?;
        Ok(exists)
    }

    pub async fn reviews_for_website(&self, website_id: i64) -> Result<Vec<Review>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.website_id = ? ORDER BY r.created_at DESC, r.id DESC"
        ))?;
        let reviews = stmt
            .query_map([website_id], |row| Review::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// Reviews written by `user_id`, newest first.
    pub async fn reviews_by_user(&self, user_id: i64) -> Result<Vec<Review>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.user_id = ? ORDER BY r.created_at DESC, r.id DESC"
        ))?;
        let reviews = stmt
            .query_map([user_id], |row| Review::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, Error> {
        let conn = self.conn.lock().await;
        query_profile(&conn, user_id)
    }

    pub async fn get_or_create_profile(&self, user_id: i64) -> Result<Profile, Error> {
        let conn = self.conn.lock().await;
        conn.execute("INSERT OR IGNORE INTO profiles (user_id) VALUES (?)", [user_id])?;
        query_profile(&conn, user_id)?.ok_or(Error::QueryReturnedNoRows)
    }

    pub async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile, Error> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("INSERT OR IGNORE INTO profiles (user_id) VALUES (?)", [user_id])?;
        tx.execute(
            "UPDATE profiles
             SET bio = ?, location = ?, profession = ?, contact_info = ?,
                 github = ?, linkedin = ?, twitter = ?, facebook = ?, instagram = ?
             WHERE user_id = ?",
            params![
                trimmed(&update.bio),
                trimmed(&update.location),
                trimmed(&update.profession),
                trimmed(&update.contact_info),
                trimmed(&update.github),
                trimmed(&update.linkedin),
                trimmed(&update.twitter),
                trimmed(&update.facebook),
                trimmed(&update.instagram),
                user_id
            ],
        )?;
        let profile = query_profile(&tx, user_id)?.ok_or(Error::QueryReturnedNoRows)?;
        tx.commit()?;
        debug!("[DB] Profile updated for user {}", user_id);
        Ok(profile)
    }

    pub async fn list_profiles(&self, user_id: Option<i64>) -> Result<Vec<Profile>, Error> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM profiles WHERE (?1 IS NULL OR user_id = ?1) ORDER BY id ASC",
        )?;
        let profiles = stmt
            .query_map([user_id], |row| Profile::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    pub async fn insert_contact(&self, message: &ContactMessage) -> Result<i64, Error> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO contacts (email, subject, message) VALUES (?, ?, ?)",
            params![message.email.trim(), message.subject.trim(), message.message.trim()],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn query_website(conn: &Connection, website_id: i64) -> Result<Option<Website>, Error> {
    conn.query_row(
        &format!("SELECT {WEBSITE_COLUMNS} FROM websites w WHERE w.id = ?"),
        [website_id],
        |row| Website::try_from(row),
    )
    .optional()
}

fn query_review(conn: &Connection, review_id: i64) -> Result<Option<Review>, Error> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.id = ?"),
        [review_id],
        |row| Review::try_from(row),
    )
    .optional()
}

fn query_profile(conn: &Connection, user_id: i64) -> Result<Option<Profile>, Error> {
    conn.query_row(
        "SELECT * FROM profiles WHERE user_id = ?",
        [user_id],
        |row| Profile::try_from(row),
    )
    .optional()
}
