//! Typed endpoint calls over a [`Transport`].
//!
//! ERROR HANDLING
//! ==============
//! Mutating calls refuse to send without a CSRF token
//! ([`ClientError::MissingCsrfToken`]). Envelope endpoints (register, cancel,
//! status) are decoded regardless of HTTP status because the server puts its
//! error text in the body. Plain data endpoints treat any non-2xx as an error
//! (404 -> `NotFound`, otherwise `Rejected` or `HttpStatus`).

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde::de::DeserializeOwned;

use super::csrf::{CSRF_HEADER, CsrfToken};
use super::transport::{ApiRequest, ApiResponse, FormPart, Method, Transport};
use super::types::{
    ActionResponse, CommentCreated, CommentPage, EventUpdateResponse, FeedCommentCreated, FeedCommentsHtml,
    ForumLikeResponse, ForumPostDeleted, ForumPostReply, LikeResponse, LikeState, PostPage, PostSuggestion,
    ReportResponse, SaveSearchResponse, SavedSearch, StatusMessage, StatusResponse, SuggestionResponse, TopicCount,
};
use crate::error::ClientError;

// =============================================================================
// ENDPOINTS
// =============================================================================

pub(crate) fn register_endpoint(event_id: u64) -> String {
    format!("/events/event/{event_id}/register/")
}

pub(crate) fn cancel_endpoint(event_id: u64) -> String {
    format!("/events/event/{event_id}/cancel/")
}

pub(crate) fn status_endpoint(event_id: u64) -> String {
    format!("/events/api/event/{event_id}/status/")
}

pub(crate) fn event_page(event_id: u64) -> String {
    format!("/events/event/{event_id}/")
}

pub(crate) fn event_delete_endpoint(event_id: u64) -> String {
    format!("/events/{event_id}/delete/")
}

pub(crate) fn event_update_endpoint(event_id: u64) -> String {
    format!("/events/api/events/{event_id}/update/")
}

pub(crate) fn comment_create_endpoint(event_id: u64) -> String {
    format!("/events/{event_id}/comment/")
}

pub(crate) fn comment_delete_endpoint(comment_id: u64) -> String {
    format!("/events/comment/{comment_id}/delete/")
}

pub(crate) fn comment_like_endpoint(comment_id: u64) -> String {
    format!("/events/comment/{comment_id}/like/")
}

pub(crate) fn comments_page_endpoint(event_id: u64) -> String {
    format!("/events/{event_id}/comments/")
}

pub(crate) fn feed_like_endpoint(post_id: u64) -> String {
    format!("/feeds/post/{post_id}/like/")
}

pub(crate) fn feed_delete_endpoint(post_id: u64) -> String {
    format!("/feeds/post/{post_id}/delete/")
}

pub(crate) fn forum_like_endpoint(post_id: u64) -> String {
    format!("/forums/post/{post_id}/like/")
}

pub(crate) fn feed_comments_endpoint(post_id: u64) -> String {
    format!("/feeds/post/{post_id}/comments/")
}

pub(crate) fn feed_comment_create_endpoint(post_id: u64) -> String {
    format!("/feeds/post/{post_id}/comment/")
}

pub(crate) fn feed_comment_like_endpoint(comment_id: u64) -> String {
    format!("/feeds/comment/{comment_id}/like/")
}

pub(crate) fn feed_report_endpoint(post_id: u64) -> String {
    format!("/feeds/post/{post_id}/report/")
}

pub(crate) fn forum_create_post_endpoint(forum_id: u64) -> String {
    format!("/forums/{forum_id}/create-post/")
}

pub(crate) fn forum_delete_endpoint(post_id: u64) -> String {
    format!("/forums/post/{post_id}/delete/")
}

pub(crate) fn forum_page(forum_id: u64) -> String {
    format!("/forums/{forum_id}/")
}

pub(crate) fn forum_drafts_page(forum_id: u64) -> String {
    format!("/forums/forum/{forum_id}/drafts/")
}

pub(crate) fn forum_post_page(forum_id: u64, post_id: u64) -> String {
    format!("/forums/forum/{forum_id}/post/{post_id}")
}

pub const EVENT_LIST_PAGE: &str = "/events/";
pub const TOPIC_COUNT_ENDPOINT: &str = "/forums/get_topic_count/";
pub const FEED_PAGE_ENDPOINT: &str = "/feeds/load-more-posts/";
pub const FORUM_SEARCH_ENDPOINT: &str = "/forums/search/posts/";
pub const RECENT_SEARCHES_ENDPOINT: &str = "/maps/recent-searches/";
pub const SAVE_SEARCH_ENDPOINT: &str = "/maps/save-search/";
pub const IP_LOCATION_URL: &str = "https://ipapi.co/json/";

// =============================================================================
// CLIENT
// =============================================================================

/// Typed API calls with CSRF handling.
pub struct ApiClient<T> {
    transport: T,
    csrf: Option<CsrfToken>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, csrf: Option<CsrfToken>) -> Self {
        Self { transport, csrf }
    }

    pub fn set_csrf(&mut self, csrf: Option<CsrfToken>) {
        self.csrf = csrf;
    }

    #[must_use]
    pub fn has_csrf(&self) -> bool {
        self.csrf.is_some()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request, attaching CSRF headers to mutating calls.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingCsrfToken`] for a mutating request with no
    /// token, or the transport error.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let request = if request.is_mutating() {
            let Some(token) = &self.csrf else {
                tracing::error!(path = %request.path, "CSRF token missing; refusing mutating request");
                return Err(ClientError::MissingCsrfToken);
            };
            request
                .header(CSRF_HEADER, token.as_str())
                .header("X-Requested-With", "XMLHttpRequest")
        } else {
            request
        };
        self.transport.send(request).await
    }

    async fn send_json<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ClientError> {
        let response = self.send(request).await?;
        if !response.ok() {
            return Err(status_error(&response));
        }
        decode_json(&response)
    }

    async fn send_action(&self, request: ApiRequest) -> Result<ActionResponse, ClientError> {
        let response = self.send(request).await?;
        let action: ActionResponse = decode_json(&response)?;
        action.into_result(response.status)
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// `GET /events/api/event/{id}/status/`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`/`Rejected` when the server reports `success: false`.
    pub async fn event_status(&self, event_id: u64) -> Result<StatusResponse, ClientError> {
        let response = self.send(ApiRequest::get(status_endpoint(event_id))).await?;
        let status: StatusResponse = decode_json(&response)?;
        if status.success {
            return Ok(status);
        }
        let message = status.error.unwrap_or_else(|| "status unavailable".to_owned());
        if response.status == 404 {
            Err(ClientError::NotFound(message))
        } else {
            Err(ClientError::Rejected { message, details: None })
        }
    }

    /// `POST /events/event/{id}/register/` with form data.
    ///
    /// # Errors
    ///
    /// Returns the classified envelope error.
    pub async fn register(&self, event_id: u64, form: &[(String, String)]) -> Result<ActionResponse, ClientError> {
        self.send_action(ApiRequest::post(register_endpoint(event_id)).form(form.to_vec()))
            .await
    }

    /// `POST /events/event/{id}/cancel/`.
    ///
    /// # Errors
    ///
    /// Returns the classified envelope error.
    pub async fn cancel(&self, event_id: u64) -> Result<ActionResponse, ClientError> {
        self.send_action(ApiRequest::post(cancel_endpoint(event_id)))
            .await
    }

    // -------------------------------------------------------------------------
    // Event management
    // -------------------------------------------------------------------------

    /// `DELETE /events/{id}/delete/`; returns the server message.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a non-success reply.
    pub async fn delete_event(&self, event_id: u64) -> Result<String, ClientError> {
        let response = self
            .send(ApiRequest::new(Method::Delete, event_delete_endpoint(event_id)))
            .await?;
        let reply: StatusMessage = decode_json(&response)?;
        if response.ok() && reply.status != "error" {
            return Ok(reply.message.unwrap_or_else(|| "Event deleted successfully".to_owned()));
        }
        Err(ClientError::Rejected {
            message: reply.message.unwrap_or_else(|| "Failed to delete event".to_owned()),
            details: None,
        })
    }

    /// `PATCH /events/api/events/{id}/update/` with form data.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` carrying the server `error`/`details`.
    pub async fn update_event(
        &self,
        event_id: u64,
        form: &[(String, String)],
    ) -> Result<EventUpdateResponse, ClientError> {
        let request = ApiRequest::new(Method::Patch, event_update_endpoint(event_id)).form(form.to_vec());
        let response = self.send(request).await?;
        let reply: EventUpdateResponse = decode_json(&response)?;
        if response.ok() {
            return Ok(reply);
        }
        let message = reply.error.unwrap_or_else(|| "Update failed".to_owned());
        if response.status == 404 {
            return Err(ClientError::NotFound(message));
        }
        Err(ClientError::Rejected { message, details: reply.details })
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// `POST /events/{id}/comment/`; returns rendered comment markup.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the server message on failure.
    pub async fn post_comment(&self, event_id: u64, form: &[(String, String)]) -> Result<CommentCreated, ClientError> {
        let request = ApiRequest::post(comment_create_endpoint(event_id)).form(form.to_vec());
        let response = self.send(request).await?;
        let reply: CommentCreated = decode_json(&response)?;
        if response.ok() {
            return Ok(reply);
        }
        Err(ClientError::Rejected {
            message: reply.message.unwrap_or_else(|| "Error posting comment".to_owned()),
            details: None,
        })
    }

    /// `DELETE /events/comment/{id}/delete/`.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the response text on failure.
    pub async fn delete_comment(&self, comment_id: u64) -> Result<(), ClientError> {
        let response = self
            .send(ApiRequest::new(Method::Delete, comment_delete_endpoint(comment_id)))
            .await?;
        if response.ok() {
            return Ok(());
        }
        let message = if response.body.trim().is_empty() {
            "Failed to delete comment".to_owned()
        } else {
            response.body
        };
        Err(ClientError::Rejected { message, details: None })
    }

    /// `POST /events/comment/{id}/like/`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn toggle_comment_like(&self, comment_id: u64) -> Result<LikeState, ClientError> {
        let reply: LikeResponse = self
            .send_json(ApiRequest::post(comment_like_endpoint(comment_id)))
            .await?;
        Ok(reply.into())
    }

    /// `GET /events/{id}/comments/?page=n`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn comments_page(&self, event_id: u64, page: u32) -> Result<CommentPage, ClientError> {
        self.send_json(ApiRequest::get(comments_page_endpoint(event_id)).query("page", page.to_string()))
            .await
    }

    // -------------------------------------------------------------------------
    // Feeds and forums
    // -------------------------------------------------------------------------

    /// `GET /feeds/load-more-posts/?page=n&trending=bool`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn feed_page(&self, page: u32, trending: bool) -> Result<PostPage, ClientError> {
        let request = ApiRequest::get(FEED_PAGE_ENDPOINT)
            .query("page", page.to_string())
            .query("trending", trending.to_string());
        self.send_json(request).await
    }

    /// `POST /feeds/post/{id}/like/`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn toggle_feed_like(&self, post_id: u64) -> Result<LikeState, ClientError> {
        let reply: LikeResponse = self
            .send_json(ApiRequest::post(feed_like_endpoint(post_id)))
            .await?;
        Ok(reply.into())
    }

    /// `POST /feeds/post/{id}/delete/`.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a non-2xx reply.
    pub async fn delete_feed_post(&self, post_id: u64) -> Result<(), ClientError> {
        let response = self.send(ApiRequest::post(feed_delete_endpoint(post_id))).await?;
        if response.ok() {
            Ok(())
        } else {
            Err(ClientError::Rejected { message: "Failed to delete post".to_owned(), details: None })
        }
    }

    /// `POST /forums/post/{id}/like/`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn toggle_forum_like(&self, post_id: u64) -> Result<LikeState, ClientError> {
        let reply: ForumLikeResponse = self
            .send_json(ApiRequest::post(forum_like_endpoint(post_id)))
            .await?;
        Ok(reply.into())
    }

    /// `GET /feeds/post/{id}/comments/`; returns the rendered comment list.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn feed_post_comments(&self, post_id: u64) -> Result<String, ClientError> {
        let reply: FeedCommentsHtml = self.send_json(ApiRequest::get(feed_comments_endpoint(post_id))).await?;
        Ok(reply.html)
    }

    /// `POST /feeds/post/{id}/comment/` with `{content}`; returns the new
    /// comment count when the server sends one.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn post_feed_comment(&self, post_id: u64, content: &str) -> Result<Option<u64>, ClientError> {
        let request =
            ApiRequest::post(feed_comment_create_endpoint(post_id)).json(serde_json::json!({ "content": content }));
        let reply: FeedCommentCreated = self.send_json(request).await?;
        Ok(reply.comments_count)
    }

    /// `POST /feeds/comment/{id}/like/`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn toggle_feed_comment_like(&self, comment_id: u64) -> Result<LikeState, ClientError> {
        let reply: LikeResponse = self
            .send_json(ApiRequest::post(feed_comment_like_endpoint(comment_id)))
            .await?;
        Ok(reply.into())
    }

    /// `POST /feeds/post/{id}/report/` with the report form as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the form errors as details when the server
    /// refuses the report.
    pub async fn report_feed_post(&self, post_id: u64, fields: &[(String, String)]) -> Result<(), ClientError> {
        let body: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();
        let response = self
            .send(ApiRequest::post(feed_report_endpoint(post_id)).json(serde_json::Value::Object(body)))
            .await?;
        let reply: ReportResponse = decode_json(&response)?;
        if response.ok() && reply.success {
            return Ok(());
        }
        Err(ClientError::Rejected {
            message: "Failed to submit report".to_owned(),
            details: reply.errors.map(|errors| errors.to_string()),
        })
    }

    /// `POST /forums/{id}/create-post/` as multipart form data.
    ///
    /// A 2xx reply that is not JSON (a rendered page after a draft save) counts
    /// as success with no post details.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a `status: "error"` reply, otherwise the status
    /// error.
    pub async fn create_forum_post(&self, forum_id: u64, parts: Vec<FormPart>) -> Result<ForumPostReply, ClientError> {
        let request = ApiRequest::post(forum_create_post_endpoint(forum_id)).multipart(parts);
        let response = self.send(request).await?;
        if !response.ok() {
            return Err(status_error(&response));
        }
        let Ok(reply) = serde_json::from_str::<ForumPostReply>(&response.body) else {
            return Ok(ForumPostReply::default());
        };
        if reply.status.as_deref() == Some("error") {
            return Err(ClientError::Rejected {
                message: reply.message.unwrap_or_else(|| "Failed to post".to_owned()),
                details: None,
            });
        }
        Ok(reply)
    }

    /// `POST /forums/post/{id}/delete/`.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for a `status: "error"` reply, otherwise the
    /// decode/status error.
    pub async fn delete_forum_post(&self, post_id: u64) -> Result<ForumPostDeleted, ClientError> {
        let reply: ForumPostDeleted = self.send_json(ApiRequest::post(forum_delete_endpoint(post_id))).await?;
        if reply.status == "error" {
            return Err(ClientError::Rejected {
                message: reply.message.unwrap_or_else(|| "Failed to delete the post".to_owned()),
                details: None,
            });
        }
        Ok(reply)
    }

    /// `GET /forums/get_topic_count/`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn topic_count(&self) -> Result<Option<u64>, ClientError> {
        let reply: TopicCount = self.send_json(ApiRequest::get(TOPIC_COUNT_ENDPOINT)).await?;
        Ok(reply.post_count)
    }

    /// `GET /forums/search/posts/?q=..&forum_id=..`.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn search_forum_posts(&self, forum_id: u64, query: &str) -> Result<Vec<PostSuggestion>, ClientError> {
        let request = ApiRequest::get(FORUM_SEARCH_ENDPOINT)
            .query("q", query)
            .query("forum_id", forum_id.to_string());
        let reply: SuggestionResponse = self.send_json(request).await?;
        Ok(reply.suggestions)
    }

    // -------------------------------------------------------------------------
    // Maps
    // -------------------------------------------------------------------------

    /// `GET /maps/recent-searches/`; returns queries, newest first.
    ///
    /// # Errors
    ///
    /// Returns the decode/status error.
    pub async fn recent_searches(&self) -> Result<Vec<String>, ClientError> {
        let searches: Vec<SavedSearch> = self.send_json(ApiRequest::get(RECENT_SEARCHES_ENDPOINT)).await?;
        Ok(searches.into_iter().map(|s| s.query).collect())
    }

    /// `POST /maps/save-search/` with `{query}`.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when the server reports failure.
    pub async fn save_search(&self, query: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post(SAVE_SEARCH_ENDPOINT).json(serde_json::json!({ "query": query }));
        let reply: SaveSearchResponse = self.send_json(request).await?;
        if reply.success {
            Ok(())
        } else {
            Err(ClientError::Rejected {
                message: reply.message.unwrap_or_else(|| "search not saved".to_owned()),
                details: None,
            })
        }
    }
}

/// Classify a non-2xx response, preferring the server's `error`/`message` text.
pub(crate) fn status_error(response: &ApiResponse) -> ClientError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error.or(b.message));
    match (response.status, message) {
        (404, Some(message)) => ClientError::NotFound(message),
        (404, None) => ClientError::NotFound(format!("HTTP 404: {}", snippet(&response.body))),
        (_, Some(message)) => ClientError::Rejected { message, details: None },
        (status, None) => ClientError::HttpStatus { status, body: response.body.clone() },
    }
}

/// Decode a JSON body, falling back to the HTTP status when it is not JSON.
pub(crate) fn decode_json<R: DeserializeOwned>(response: &ApiResponse) -> Result<R, ClientError> {
    match serde_json::from_str::<R>(&response.body) {
        Ok(value) => Ok(value),
        Err(_) if !response.ok() => Err(status_error(response)),
        Err(e) => Err(ClientError::Parse(e.to_string())),
    }
}

fn snippet(body: &str) -> &str {
    let end = body.char_indices().nth(80).map_or(body.len(), |(i, _)| i);
    body[..end].trim()
}
