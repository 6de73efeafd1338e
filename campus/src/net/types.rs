//! Wire DTOs for the server's JSON endpoints.
//!
//! DESIGN
//! ======
//! Field names mirror the server responses exactly. Everything the server may
//! omit is `Option` or `#[serde(default)]`; interpretation (defaults, derived
//! states) lives in the domain modules, not here.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// =============================================================================
// ACTION ENVELOPE
// =============================================================================

/// Messages for one form field: Django sends a list, older views a string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    One(String),
    Many(Vec<String>),
}

impl FieldMessages {
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(msg) => vec![msg],
            Self::Many(msgs) => msgs,
        }
    }
}

/// `error`/`errors` payload: either a plain message or field-keyed messages.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Fields(BTreeMap<String, FieldMessages>),
}

/// Response body of register/cancel/status-changing calls.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<ErrorPayload>,
    pub errors: Option<ErrorPayload>,
    pub details: Option<String>,
    /// `registered` or `waitlist` after a successful registration.
    pub status: Option<String>,
    pub waitlist_position: Option<u32>,
    pub spots_left: Option<i64>,
    pub max_participants: Option<i64>,
    pub waitlist_promoted: Option<bool>,
    pub previous_status: Option<String>,
    pub status_code: Option<String>,
}

impl ActionResponse {
    /// Convert a `success: false` envelope into the matching error.
    ///
    /// Field-keyed `errors` win over a plain `error` message, matching how the
    /// registration form reports validation problems. `http_status` 404 maps to
    /// [`ClientError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns the classified error when `success` is false.
    pub fn into_result(mut self, http_status: u16) -> Result<Self, ClientError> {
        if self.success {
            return Ok(self);
        }

        let payload = self.errors.take().or_else(|| self.error.take());
        if let Some(ErrorPayload::Fields(fields)) = payload {
            let fields = fields
                .into_iter()
                .map(|(field, msgs)| (field, msgs.into_vec()))
                .collect();
            return Err(ClientError::Validation { fields });
        }

        let message = match payload {
            Some(ErrorPayload::Message(msg)) => msg,
            _ => self.message.take().unwrap_or_default(),
        };
        if http_status == 404 {
            return Err(ClientError::NotFound(message));
        }
        Err(ClientError::Rejected { message, details: self.details })
    }
}

// =============================================================================
// REGISTRATION STATUS
// =============================================================================

/// User-specific part of the status response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatusDto {
    #[serde(default)]
    pub is_registered: bool,
    pub status: Option<String>,
    pub waitlist_position: Option<u32>,
}

/// `GET /events/api/event/{id}/status/`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    pub total_spots: Option<i64>,
    pub spots_left: Option<i64>,
    pub is_full: Option<bool>,
    pub is_waitlist_open: Option<bool>,
    pub event_start_date: Option<String>,
    pub registration_open: Option<bool>,
    pub registration_deadline: Option<String>,
    #[serde(default)]
    pub user_status: UserStatusDto,
    pub error: Option<String>,
}

// =============================================================================
// EVENTS
// =============================================================================

/// `PATCH /events/api/events/{id}/update/`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct EventUpdateResponse {
    pub message: Option<String>,
    pub updated_data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub details: Option<String>,
}

/// `DELETE /events/{id}/delete/` and similar `{status, message}` replies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
}

// =============================================================================
// COMMENTS AND LIKES
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CommentPage {
    #[serde(default)]
    pub comments_html: String,
    #[serde(default)]
    pub has_next: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CommentCreated {
    #[serde(default)]
    pub comment_html: String,
    pub comment_id: Option<u64>,
    pub message: Option<String>,
}

/// Like toggle reply used by comments and feed posts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct LikeResponse {
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub is_liked: bool,
}

/// Forum post like toggle: `{like_count, status: "liked" | "unliked"}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ForumLikeResponse {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub status: String,
}

/// Normalized like state after a toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LikeState {
    pub count: u64,
    pub liked: bool,
}

impl From<LikeResponse> for LikeState {
    fn from(resp: LikeResponse) -> Self {
        Self { count: resp.likes_count, liked: resp.is_liked }
    }
}

impl From<ForumLikeResponse> for LikeState {
    fn from(resp: ForumLikeResponse) -> Self {
        Self { count: resp.like_count, liked: resp.status == "liked" }
    }
}

// =============================================================================
// FEEDS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: u64,
    #[serde(default)]
    pub content: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `GET /feeds/load-more-posts/?page=n&trending=bool`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PostPage {
    #[serde(default)]
    pub posts: Vec<FeedPost>,
    pub current_page: u32,
    #[serde(default)]
    pub has_next: bool,
}

/// `GET /feeds/post/{id}/comments/`: rendered comment list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeedCommentsHtml {
    #[serde(default)]
    pub html: String,
}

/// `POST /feeds/post/{id}/comment/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeedCommentCreated {
    pub comments_count: Option<u64>,
}

/// `POST /feeds/post/{id}/report/`; `errors` is whatever the form produced.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReportResponse {
    #[serde(default)]
    pub success: bool,
    pub errors: Option<serde_json::Value>,
}

// =============================================================================
// FORUMS
// =============================================================================

/// `POST /forums/{id}/create-post/`: `status` is `posted` or `error`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ForumPostReply {
    pub status: Option<String>,
    pub message: Option<String>,
    pub post_id: Option<u64>,
    pub content: Option<String>,
    pub username: Option<String>,
    pub forum_name: Option<String>,
    #[serde(default)]
    pub user_can_delete: bool,
}

/// `POST /forums/post/{id}/delete/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ForumPostDeleted {
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
    pub forum_id: Option<u64>,
    pub post_count: Option<u64>,
}

/// `GET /forums/get_topic_count/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TopicCount {
    pub post_count: Option<u64>,
}

// =============================================================================
// SEARCH AND MAPS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSuggestion {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created_at: String,
    pub media: Option<String>,
}

impl PostSuggestion {
    /// Video media renders as a play tile instead of a thumbnail.
    #[must_use]
    pub fn has_video(&self) -> bool {
        self.media
            .as_deref()
            .is_some_and(|m| m.ends_with(".mp4") || m.ends_with(".webm") || m.ends_with(".ogg"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SuggestionResponse {
    #[serde(default)]
    pub suggestions: Vec<PostSuggestion>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SavedSearch {
    pub query: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SaveSearchResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

/// Subset of the `ipapi.co/json/` reply used for coarse location.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct IpLocationResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
