//! Record types stored in the document collections.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A record that lives in one named collection, keyed by its id
pub trait Document: Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (and file) name
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

/// Registered application user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Unique login name
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    /// Argon2 hash of the user's password
    pub password_hash: String,
    /// Calendar color, `#rrggbb`
    pub color: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            role: self.role,
            color: self.color.clone(),
            active: self.active,
            created_at: self.created_at,
        }
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> &str {
        &self.id
    }
}

/// User as sent to clients, without the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub color: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document for Company {
    const COLLECTION: &'static str = "companies";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A driven route, the unit kilometer maps are built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    /// One-way distance
    pub kilometers: f64,
    pub round_trip: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Route {
    /// Distance actually driven, doubled for round trips
    pub fn driven_kilometers(&self) -> f64 {
        if self.round_trip {
            self.kilometers * 2.0
        } else {
            self.kilometers
        }
    }
}

impl Document for Route {
    const COLLECTION: &'static str = "routes";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::str::FromStr for HolidayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(HolidayStatus::Pending),
            "approved" => Ok(HolidayStatus::Approved),
            "rejected" => Ok(HolidayStatus::Rejected),
            other => Err(format!("unknown holiday status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayRequest {
    pub id: String,
    pub user_id: String,
    /// Requested days, sorted and unique
    pub dates: Vec<NaiveDate>,
    pub notes: Option<String>,
    pub status: HolidayStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Document for HolidayRequest {
    const COLLECTION: &'static str = "holidays";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Kilometers,
    Holidays,
    Invoice,
    Other,
}

impl std::str::FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kilometers" => Ok(TemplateKind::Kilometers),
            "holidays" => Ok(TemplateKind::Holidays),
            "invoice" => Ok(TemplateKind::Invoice),
            "" | "other" => Ok(TemplateKind::Other),
            other => Err(format!("unknown template kind '{}'", other)),
        }
    }
}

/// Metadata of an uploaded Excel template; the bytes live next to the collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcelTemplate {
    pub id: String,
    pub name: String,
    pub kind: TemplateKind,
    /// Original file name of the upload
    pub file_name: String,
    pub size: u64,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document for ExcelTemplate {
    const COLLECTION: &'static str = "templates";

    fn id(&self) -> &str {
        &self.id
    }
}
