//! Event comment thread: posting, deleting, liking, and paging.
//!
//! Reply counts are tracked per parent so a deleted reply can update its
//! parent's counter without re-fetching the thread. Counts never go below
//! zero.

#[cfg(test)]
#[path = "comments_test.rs"]
mod comments_test;

use std::collections::HashMap;

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::transport::Transport;
use crate::net::types::{CommentCreated, LikeState};

/// Server page size for `/events/{id}/comments/`.
pub const COMMENTS_PER_PAGE: usize = 5;

pub const DELETE_COMMENT_CONFIRM_PROMPT: &str =
    "Are you sure you want to delete this comment? This action cannot be undone.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentThread {
    event_id: u64,
    /// Last page appended; the server renders page 1 with the event.
    page: u32,
    has_next: bool,
    reply_counts: HashMap<u64, u32>,
}

impl CommentThread {
    #[must_use]
    pub fn new(event_id: u64, has_next: bool) -> Self {
        Self { event_id, page: 1, has_next, reply_counts: HashMap::new() }
    }

    #[must_use]
    pub fn event_id(&self) -> u64 {
        self.event_id
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    #[must_use]
    pub fn reply_count(&self, parent_id: u64) -> u32 {
        self.reply_counts.get(&parent_id).copied().unwrap_or(0)
    }

    /// Seed a parent's reply count from the rendered page.
    pub fn set_reply_count(&mut self, parent_id: u64, count: u32) {
        self.reply_counts.insert(parent_id, count);
    }

    /// Post a comment, or a reply when `parent_id` is set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank content without sending anything,
    /// otherwise the request error.
    pub async fn post<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        content: &str,
        parent_id: Option<u64>,
    ) -> Result<CommentCreated, ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::InvalidInput("comment content is empty".into()));
        }

        let mut form = vec![("content".to_owned(), content.to_owned())];
        if let Some(parent) = parent_id {
            form.push(("parent".to_owned(), parent.to_string()));
        }

        let created = api.post_comment(self.event_id, &form).await?;
        if let Some(parent) = parent_id {
            let count = self.reply_counts.entry(parent).or_insert(0);
            *count = count.saturating_add(1);
        }
        tracing::info!(event_id = self.event_id, reply = parent_id.is_some(), "comment posted");
        Ok(created)
    }

    /// Delete a comment by its raw id attribute.
    ///
    /// When `parent_id` is set the comment is a reply and the parent's count
    /// drops by one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or non-numeric id before any
    /// request, otherwise the request error.
    pub async fn delete<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        raw_comment_id: &str,
        parent_id: Option<u64>,
    ) -> Result<(), ClientError> {
        let comment_id = parse_comment_id(raw_comment_id)?;
        if let Err(e) = api.delete_comment(comment_id).await {
            tracing::warn!(comment_id, error = %e, "comment deletion failed");
            return Err(e);
        }
        if let Some(parent) = parent_id {
            let count = self.reply_counts.entry(parent).or_insert(0);
            *count = count.saturating_sub(1);
        }
        tracing::info!(comment_id, "comment deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the request error.
    pub async fn toggle_like<T: Transport>(&self, api: &ApiClient<T>, comment_id: u64) -> Result<LikeState, ClientError> {
        api.toggle_comment_like(comment_id).await
    }

    /// Fetch the next page of rendered comments. Returns `None` without a
    /// request when the thread has no more pages.
    ///
    /// # Errors
    ///
    /// Returns the request error; the page position is unchanged.
    pub async fn load_more<T: Transport>(&mut self, api: &ApiClient<T>) -> Result<Option<String>, ClientError> {
        if !self.has_next {
            return Ok(None);
        }
        let next = self.page.saturating_add(1);
        let page = api.comments_page(self.event_id, next).await?;
        self.page = next;
        self.has_next = page.has_next;
        Ok(Some(page.comments_html))
    }
}

fn parse_comment_id(raw: &str) -> Result<u64, ClientError> {
    let raw = raw.trim();
    if raw.is_empty() {
        tracing::error!("comment id missing");
        return Err(ClientError::InvalidInput("Invalid comment ID".into()));
    }
    raw.parse()
        .map_err(|_| ClientError::InvalidInput(format!("Invalid comment ID: {raw}")))
}
