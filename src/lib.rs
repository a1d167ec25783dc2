//! Finest: website submissions, peer reviews and rating leaderboards.
pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod leaderboard;
pub mod media;
pub mod models;
pub mod site_of_the_day;
pub mod validation;
