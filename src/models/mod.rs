//! Data models for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "complaint_priority")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            "Critical" => Ok(Priority::Critical),
            _ => Err(()),
        }
    }
}

/// Complaint progression. Ordered, but any status may be set by an admin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "complaint_status")]
pub enum ComplaintStatus {
    #[default]
    New,
    #[serde(rename = "In Review")]
    #[sqlx(rename = "In Review")]
    InReview,
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::New => "New",
            ComplaintStatus::InReview => "In Review",
            ComplaintStatus::InProgress => "In Progress",
            ComplaintStatus::Resolved => "Resolved",
        }
    }

    /// Still waiting for an admin to pick it up.
    pub fn is_pending(&self) -> bool {
        matches!(self, ComplaintStatus::New | ComplaintStatus::InReview)
    }
}

impl FromStr for ComplaintStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(ComplaintStatus::New),
            "In Review" => Ok(ComplaintStatus::InReview),
            "In Progress" => Ok(ComplaintStatus::InProgress),
            "Resolved" => Ok(ComplaintStatus::Resolved),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Insert payload for the user store. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Admin-editable user fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Display form of a referenced user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// The authenticated principal carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// Complaint
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalNote {
    pub text: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complaint {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub department: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub owner_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub internal_notes: Vec<InternalNote>,
    pub public_response: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.owner_id == identity.id
    }
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    pub department: String,
    pub priority: Priority,
    pub owner_id: Uuid,
}

/// Fields an owner may edit on their own complaint.
#[derive(Debug, Clone, Default)]
pub struct ContentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub priority: Option<Priority>,
}

/// Fields only an admin may edit.
#[derive(Debug, Clone, Default)]
pub struct TriageChanges {
    pub status: Option<ComplaintStatus>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the assignee.
    pub assigned_to: Option<Option<Uuid>>,
    pub public_response: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ComplaintQuery {
    pub owner_id: Option<Uuid>,
    pub include_archived: bool,
}

impl ComplaintQuery {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
            include_archived: false,
        }
    }

    pub fn active() -> Self {
        Self::default()
    }

    pub fn everything() -> Self {
        Self {
            owner_id: None,
            include_archived: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub department: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub owner_id: Uuid,
    pub owner: Option<UserSummary>,
    pub assigned_to_id: Option<Uuid>,
    pub assigned_to: Option<UserSummary>,
    pub public_response: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only present for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<Vec<InternalNote>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintStats {
    pub total_complaints: usize,
    pub pending_complaints: usize,
    pub resolved_complaints: usize,
    pub high_priority_complaints: usize,
    pub complaints_by_category: Vec<GroupCount>,
    pub complaints_by_status: Vec<GroupCount>,
    pub resolution_trends: Vec<GroupCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub key: String,
    pub count: usize,
}

// =============================================================================
// Reference data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DepartmentChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the manager
    pub manager_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentView {
    pub id: Uuid,
    pub name: String,
    pub manager: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplaintRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub assigned_to: Option<Option<Uuid>>,
    pub public_response: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub older_than_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub manager: Option<Option<Uuid>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// =============================================================================
// API Responses
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
