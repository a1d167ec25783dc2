use serde::{Deserialize, Serialize};

pub const USERNAME_MAX_LEN: usize = 150;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

impl User {
    pub fn avatar_url(&self) -> String {
        format!("https://robohash.org/{}.png?size=96x96", self.username)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profession: Option<String>,
    pub contact_info: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
}

/// Editable profile fields. Absent fields are cleared.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub location: Option<String>,
    pub profession: Option<String>,
    pub contact_info: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ContactMessage {
    pub email: String,
    pub subject: String,
    pub message: String,
}
