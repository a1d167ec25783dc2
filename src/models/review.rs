// src/models/review.rs
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::validation::{FieldError, ValidationErrors};

pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 10; // design, usability, content
pub const OVERALL_MAX: u8 = 5;

/// The four sub-ratings of a review. Only constructible through [`Scores::new`],
/// so every value held here is in range.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    design: u8,
    usability: u8,
    content: u8,
    overall: u8,
}

impl Scores {
    /// Validates every sub-score and reports each failing field.
    pub fn new(design: i64, usability: i64, content: i64, overall: i64) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let design = check_range(&mut errors, "design", design, SCORE_MAX);
        let usability = check_range(&mut errors, "usability", usability, SCORE_MAX);
        let content = check_range(&mut errors, "content", content, SCORE_MAX);
        let overall = check_range(&mut errors, "overall", overall, OVERALL_MAX);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self { design, usability, content, overall })
    }

    pub fn design(&self) -> u8 {
        self.design
    }

    pub fn usability(&self) -> u8 {
        self.usability
    }

    pub fn content(&self) -> u8 {
        self.content
    }

    pub fn overall(&self) -> u8 {
        self.overall
    }

    /// Mean of the four sub-scores, two decimals, rounded half-up.
    pub fn average(&self) -> Average {
        let sum = u32::from(self.design)
            + u32::from(self.usability)
            + u32::from(self.content)
            + u32::from(self.overall);
        // sum / 4 in hundredths, +2 rounds the remainder half-up
        Average::from_hundredths((sum * 100 + 2) / 4)
    }
}

fn check_range(errors: &mut ValidationErrors, field: &'static str, value: i64, max: u8) -> u8 {
    if value < i64::from(SCORE_MIN) || value > i64::from(max) {
        errors.push(FieldError::new(
            field,
            format!("Rating must be between {} and {}.", SCORE_MIN, max),
        ));
        return SCORE_MIN;
    }
    value as u8
}

/// A review average held in hundredths so that it never drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Average(u32);

impl Average {
    pub fn from_hundredths(hundredths: u32) -> Self {
        Average(hundredths)
    }

    /// Rounds a stored REAL back onto the two-decimal grid.
    pub fn from_f64(value: f64) -> Self {
        Average((value * 100.0).round().max(0.0) as u32)
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Average {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Request body for creating or editing a review.
#[derive(Deserialize, Debug, Clone)]
pub struct ReviewDraft {
    pub design: i64,
    pub usability: i64,
    pub content: i64,
    pub overall: i64,
    #[serde(default)]
    pub description: Option<String>,
}

impl ReviewDraft {
    pub fn scores(&self) -> Result<Scores, ValidationErrors> {
        Scores::new(self.design, self.usability, self.content, self.overall)
    }
}

/// A review about to be written. There is no average field: storage always
/// derives it from `scores`.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub website_id: i64,
    pub user_id: i64,
    pub scores: Scores,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl NewReview {
    pub fn new(website_id: i64, user_id: i64, scores: Scores, description: Option<String>) -> Self {
        Self {
            website_id,
            user_id,
            scores,
            description: normalize_description(description),
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn from_draft(website_id: i64, user_id: i64, draft: ReviewDraft) -> Result<Self, ValidationErrors> {
        let scores = draft.scores()?;
        Ok(Self::new(website_id, user_id, scores, draft.description))
    }

    pub fn created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn average(&self) -> Average {
        self.scores.average()
    }
}

pub(crate) fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// A stored review, as read back from the database.
#[derive(Serialize, Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub website_id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub scores: Scores,
    pub average: Average,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Review {
    pub(crate) fn from_parts(
        id: i64,
        website_id: i64,
        user_id: i64,
        scores: Scores,
        average: Average,
        description: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self { id, website_id, user_id, scores, average, description, created_at }
    }
}

/// Rebuilds scores that were validated on their way into storage.
pub(crate) fn stored_scores(design: u8, usability: u8, content: u8, overall: u8) -> Scores {
    Scores { design, usability, content, overall }
}
