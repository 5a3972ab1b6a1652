//! Student endpoints: profile, coins, notifications, groups and lessons.
//!
//! Each method maps one REST path to one call on the request executor.
//! Ids and pagination bounds are passed through unchecked; the backend
//! rejects bad values and the rejection surfaces as `ApiError::Status`.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::client::{ApiClient, ApiRequest, FilePart, MultipartBody};
use super::error::ApiError;
use super::types::{
    Course, CoinInstance, GroupDetails, LessonDetails, LessonsQuery, NotificationReadState,
    PageQuery, Paginated, ProfileChanges, ProfileUpdate, StudentGroupRatings,
    StudentNotification, StudentProfile,
};

const DEFAULT_PICTURE_NAME: &str = "profile.jpg";
const DEFAULT_PICTURE_MIME: &str = "image/jpeg";

#[derive(Clone)]
pub struct StudentApi {
    client: Arc<ApiClient>,
}

impl StudentApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// GET /profile/
    pub async fn profile(&self) -> Result<StudentProfile, ApiError> {
        self.client.request_json(&ApiRequest::get("/profile/")).await
    }

    /// PATCH /profile/update/
    ///
    /// Sent as multipart/form-data when the picture is a local file, as JSON otherwise.
    pub async fn update_profile(&self, changes: &ProfileChanges) -> Result<ProfileUpdate, ApiError> {
        let req = match changes.picture_file() {
            Some(path) => {
                let mut body = MultipartBody::new();
                for (name, value) in changes.text_fields() {
                    body = body.text(name, value);
                }
                body = body.file(picture_part(path).await?);
                ApiRequest::patch("/profile/update/").multipart(body)
            }
            None => {
                let fields: Map<String, Value> = changes
                    .text_fields()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), Value::String(value)))
                    .collect();
                ApiRequest::patch("/profile/update/").json(&fields)?
            }
        };
        self.client.request_json(&req).await
    }

    /// GET /profile/coins/
    pub async fn coins(&self, query: &PageQuery) -> Result<Paginated<CoinInstance>, ApiError> {
        self.list("/profile/coins/", query).await
    }

    /// GET /profile/notifications/
    pub async fn notifications(
        &self,
        query: &PageQuery,
    ) -> Result<Paginated<StudentNotification>, ApiError> {
        self.list("/profile/notifications/", query).await
    }

    /// GET /profile/notifications/mark-as-read/
    ///
    /// The backend marks the student's notifications read on a plain GET.
    pub async fn mark_notifications_read(
        &self,
        query: &PageQuery,
    ) -> Result<Paginated<NotificationReadState>, ApiError> {
        self.list("/profile/notifications/mark-as-read/", query).await
    }

    /// GET /group-ratings/
    pub async fn group_ratings(
        &self,
        query: &PageQuery,
    ) -> Result<Paginated<StudentGroupRatings>, ApiError> {
        self.list("/group-ratings/", query).await
    }

    /// GET /student-groups/
    pub async fn student_groups(&self, query: &PageQuery) -> Result<Paginated<Course>, ApiError> {
        self.list("/student-groups/", query).await
    }

    /// GET /group-details/{group_id}/
    pub async fn group_details(&self, group_id: i64) -> Result<GroupDetails, ApiError> {
        let req = ApiRequest::get(format!("/group-details/{}/", group_id));
        self.client.request_json(&req).await
    }

    /// GET /{group_id}/lesson-details/{lesson_id}/
    pub async fn lesson_details(&self, group_id: i64, lesson_id: i64) -> Result<LessonDetails, ApiError> {
        let req = ApiRequest::get(format!("/{}/lesson-details/{}/", group_id, lesson_id));
        self.client.request_json(&req).await
    }

    /// GET /my-lessons/
    ///
    /// The backend publishes no schema for this endpoint, so the body is returned as-is.
    pub async fn my_lessons(&self, query: &LessonsQuery) -> Result<Value, ApiError> {
        let req = ApiRequest::get("/my-lessons/").query(query.to_pairs());
        self.client.request(&req).await
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &PageQuery,
    ) -> Result<Paginated<T>, ApiError> {
        let req = ApiRequest::get(path).query(query.to_pairs());
        self.client.request_json(&req).await
    }
}

async fn picture_part(path: &Path) -> Result<FilePart, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Upload {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_PICTURE_NAME)
        .to_string();
    Ok(FilePart {
        field: "picture".to_string(),
        file_name,
        mime: picture_mime(path).to_string(),
        bytes,
    })
}

fn picture_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => DEFAULT_PICTURE_MIME,
    }
}
