use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::skills::{normalize, SkillSet};

#[derive(Debug, Clone, Serialize)]
pub struct Volunteer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub skills: SkillSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterVolunteerRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 30, message = "Phone number is too long"))]
    pub phone: Option<String>,

    /// Free-text, comma separated.
    pub skills: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSkillsRequest {
    pub skills: String,
}

impl Volunteer {
    pub fn new(request: RegisterVolunteerRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            phone: request.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            skills: normalize(request.skills.as_deref().unwrap_or_default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn set_skills(&mut self, skills: SkillSet) {
        self.skills = skills;
        self.updated_at = Utc::now();
    }
}
