use serde::{Deserialize, Serialize};

use super::enums::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub village: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Who is signed in. `None` role means nobody is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub role: Option<UserRole>,
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.role.is_some()
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == Some(role)
    }
}
