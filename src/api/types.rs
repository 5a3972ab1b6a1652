//! Request and response types for the student portal API.
//!
//! Field names follow the backend's snake_case JSON.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Login request body sent to POST /login/.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Refresh request body sent to POST /refresh-token/.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Refresh response from POST /refresh-token/.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}

/// Uniform envelope of every paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Pagination query shared by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub ordering: Option<String>,
}

impl PageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn ordering(mut self, ordering: impl Into<String>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    /// Flattened `key=value` pairs; unset parameters are omitted.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(ref ordering) = self.ordering {
            pairs.push(("ordering".to_string(), ordering.clone()));
        }
        pairs
    }
}

/// Query for GET /my-lessons/.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonsQuery {
    pub page: PageQuery,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl LessonsQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.page.to_pairs();
        if let Some(month) = self.month {
            pairs.push(("month".to_string(), month.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year".to_string(), year.to_string()));
        }
        pairs
    }
}

// ── Profile ──────────────────────────────────────────────────────────────

/// GET /profile/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
    pub phone: Option<String>,
}

/// PATCH /profile/update/ response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub id: i64,
    pub phone: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
}

/// Where a new profile picture comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PictureSource {
    /// Already hosted; sent as a plain string field.
    Url(String),
    /// Local image uploaded as multipart/form-data.
    File(PathBuf),
}

/// Partial profile update. Unset fields are left unchanged on the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub picture: Option<PictureSource>,
}

impl ProfileChanges {
    /// Text fields that are set, in a stable order.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let named = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ];
        for (name, value) in named {
            if let Some(v) = value {
                fields.push((name, v.clone()));
            }
        }
        if let Some(PictureSource::Url(ref url)) = self.picture {
            fields.push(("picture", url.clone()));
        }
        fields
    }

    /// Local picture path, when the update requires a multipart upload.
    pub fn picture_file(&self) -> Option<&PathBuf> {
        match self.picture {
            Some(PictureSource::File(ref path)) => Some(path),
            _ => None,
        }
    }
}

// ── Coins & notifications ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinCategory {
    pub id: i64,
    pub category_name: String,
    pub category_name_uz: Option<String>,
    pub category_name_ru: Option<String>,
    pub category_name_en: Option<String>,
    pub coin_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinInstance {
    pub id: i64,
    pub category: CoinCategory,
    pub extra_coins: Option<i64>,
    pub extra_coin_reason: Option<String>,
    pub extra_coin_reason_uz: Option<String>,
    pub extra_coin_reason_ru: Option<String>,
    pub extra_coin_reason_en: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub created_at: String,
    pub title: String,
    pub title_uz: Option<String>,
    pub title_ru: Option<String>,
    pub title_en: Option<String>,
    pub message: String,
    pub message_uz: Option<String>,
    pub message_ru: Option<String>,
    pub message_en: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentNotification {
    pub id: i64,
    pub notification: Notification,
}

/// Item of GET /profile/notifications/mark-as-read/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationReadState {
    pub id: i64,
    pub is_read: bool,
}

// ── Groups & lessons ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentGroupRatings {
    pub id: i64,
    pub name: String,
    /// Rendered by the backend as a single string.
    pub students: String,
}

/// GET /{group_id}/lesson-details/{lesson_id}/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDetails {
    pub id: i64,
    pub topic: Option<String>,
    pub lesson_video_url: Option<String>,
    /// JSON-encoded material list, `"[]"` when empty.
    pub class_materials: String,
    pub homework_materials: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupLesson {
    pub id: i64,
    pub topic: Option<String>,
    /// `ended`, `current` or `disabled`.
    pub status: String,
    pub start_time: String,
    pub end_time: String,
}

/// GET /group-details/{group_id}/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub id: i64,
    pub name: String,
    pub lessons: Vec<GroupLesson>,
    pub progress: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub all_lessons: i64,
    pub completed_lesson_count: i64,
    pub progress_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseTeacher {
    pub id: i64,
    pub name: String,
}

/// Item of GET /student-groups/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub group_name: String,
    pub course_name: String,
    pub duration: String,
    pub progress: CourseProgress,
    pub student_count: i64,
    pub teachers: Vec<CourseTeacher>,
}
