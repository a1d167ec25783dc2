pub mod review;
pub mod user;
pub mod website;

pub use review::{Average, NewReview, Review, ReviewDraft, Scores};
pub use user::{ContactMessage, Profile, ProfileUpdate, User};
pub use website::{NewWebsite, RatedWebsite, Website};
