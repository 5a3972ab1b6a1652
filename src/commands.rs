//! Command handlers behind the CLI.
//!
//! Each handler drives one façade call and returns the result as JSON for
//! printing. Errors are flattened to messages at this boundary.

use serde::Serialize;
use serde_json::{json, Value};

use crate::api::types::{LessonsQuery, PageQuery, ProfileChanges};
use crate::state::AppState;

/// Which paginated list to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Coins,
    Notifications,
    MarkRead,
    Ratings,
    Groups,
}

/// Log in and persist the session.
pub async fn login(state: &AppState, username: &str, password: &str) -> Result<Value, String> {
    let result = state
        .auth
        .login(username, password)
        .await
        .map_err(|e| format!("Login failed: {}", e))?;

    Ok(json!({
        "username": result.username,
        "profile": result.profile,
        "stored_tokens": result.stored.label(),
    }))
}

/// Logout: best-effort remote invalidation, then local cleanup.
pub async fn logout(state: &AppState) -> Result<Value, String> {
    state
        .auth
        .logout()
        .await
        .map_err(|e| format!("Local session cleanup failed: {}", e))?;
    Ok(json!({ "logged_out": true }))
}

/// Try to resume the stored session on startup.
///
/// Returns `restored: false` when nothing is stored or the refresh token is no
/// longer accepted; otherwise the tokens are rotated and the snapshot returned.
pub async fn try_silent_refresh(state: &AppState) -> Result<Value, String> {
    log::info!("Attempting silent refresh from stored session");

    let snapshot = match state.auth.restore_session().await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            log::info!("No stored session, silent refresh skipped");
            return Ok(json!({ "restored": false, "session": null }));
        }
        Err(e) => {
            log::warn!("Failed to read stored session: {}", e);
            return Ok(json!({ "restored": false, "session": null }));
        }
    };

    if !state.auth.refresh_token().await {
        log::info!("Stored session for {} could not be refreshed", snapshot.username);
        return Ok(json!({ "restored": false, "session": null }));
    }

    log::info!("Silent refresh successful for {}", snapshot.username);
    Ok(json!({ "restored": true, "session": to_json(&snapshot)? }))
}

pub async fn refresh(state: &AppState) -> Result<Value, String> {
    Ok(json!({ "refreshed": state.auth.refresh_token().await }))
}

pub async fn profile(state: &AppState) -> Result<Value, String> {
    let profile = state
        .student
        .profile()
        .await
        .map_err(|e| format!("Profile fetch failed: {}", e))?;
    to_json(&profile)
}

pub async fn update_profile(state: &AppState, changes: &ProfileChanges) -> Result<Value, String> {
    let updated = state
        .student
        .update_profile(changes)
        .await
        .map_err(|e| format!("Profile update failed: {}", e))?;
    to_json(&updated)
}

pub async fn list(state: &AppState, kind: ListKind, query: &PageQuery) -> Result<Value, String> {
    let student = &state.student;
    let result = match kind {
        ListKind::Coins => student.coins(query).await.map(|p| to_json(&p)),
        ListKind::Notifications => student.notifications(query).await.map(|p| to_json(&p)),
        ListKind::MarkRead => student.mark_notifications_read(query).await.map(|p| to_json(&p)),
        ListKind::Ratings => student.group_ratings(query).await.map(|p| to_json(&p)),
        ListKind::Groups => student.student_groups(query).await.map(|p| to_json(&p)),
    };
    result.map_err(|e| format!("{:?} fetch failed: {}", kind, e))?
}

pub async fn group(state: &AppState, group_id: i64) -> Result<Value, String> {
    let details = state
        .student
        .group_details(group_id)
        .await
        .map_err(|e| format!("Group {} fetch failed: {}", group_id, e))?;
    to_json(&details)
}

pub async fn lesson(state: &AppState, group_id: i64, lesson_id: i64) -> Result<Value, String> {
    let details = state
        .student
        .lesson_details(group_id, lesson_id)
        .await
        .map_err(|e| format!("Lesson {} fetch failed: {}", lesson_id, e))?;
    to_json(&details)
}

pub async fn lessons(state: &AppState, query: &LessonsQuery) -> Result<Value, String> {
    state
        .student
        .my_lessons(query)
        .await
        .map_err(|e| format!("Lessons fetch failed: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("Failed to encode result: {}", e))
}
