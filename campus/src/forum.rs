//! Forum topics: creating and deleting posts and tracking the topic count.
//!
//! DESIGN
//! ======
//! A `ForumPostDraft` is validated locally before anything is uploaded, so a
//! missing title or an oversized video never costs a round trip. After a
//! delete the topic count comes from the delete reply when the server sends
//! one, otherwise from the topic count endpoint.
//!
//! ERROR HANDLING
//! ==============
//! Validation failures are `InvalidInput` carrying the message shown to the
//! user. A failed count refresh after a successful delete is logged and leaves
//! the previous count in place; the delete itself still succeeded.

#[cfg(test)]
#[path = "forum_test.rs"]
mod forum_test;

use crate::error::ClientError;
use crate::net::api::{ApiClient, forum_drafts_page, forum_page, forum_post_page};
use crate::net::transport::{FormPart, Transport};

/// Largest video the forum accepts.
pub const MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;

pub const DELETE_POST_CONFIRM_PROMPT: &str = "Are you sure you want to delete this post?";

const TITLE_REQUIRED: &str = "Title is required.";
const CONTENT_REQUIRED: &str = "Content is required for text posts.";
const MEDIA_REQUIRED: &str = "Image or Video is required for image/video posts.";
const VIDEO_TOO_LARGE: &str = "Video file size must not exceed 10MB.";

/// A file attached to a forum post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Text,
    Media,
}

/// A forum post as composed in the create form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumPostDraft {
    pub title: String,
    pub content: String,
    pub kind: PostKind,
    pub image: Option<MediaFile>,
    pub video: Option<MediaFile>,
    /// Save to the drafts page instead of publishing.
    pub save_as_draft: bool,
}

impl ForumPostDraft {
    #[must_use]
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            kind: PostKind::Text,
            image: None,
            video: None,
            save_as_draft: false,
        }
    }

    /// Check the form the way the create page does before submitting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` with the message to show.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.title.trim().is_empty() {
            return Err(ClientError::InvalidInput(TITLE_REQUIRED.into()));
        }
        match self.kind {
            PostKind::Text if self.content.trim().is_empty() => {
                return Err(ClientError::InvalidInput(CONTENT_REQUIRED.into()));
            }
            PostKind::Media if self.image.is_none() && self.video.is_none() => {
                return Err(ClientError::InvalidInput(MEDIA_REQUIRED.into()));
            }
            _ => {}
        }
        if self.video.as_ref().is_some_and(|v| v.bytes.len() > MAX_VIDEO_BYTES) {
            return Err(ClientError::InvalidInput(VIDEO_TOO_LARGE.into()));
        }
        Ok(())
    }

    fn into_parts(self) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::text("title", self.title.trim()),
            FormPart::text("content", self.content),
            FormPart::text("is_draft", self.save_as_draft.to_string()),
        ];
        for (name, file) in [("image", self.image), ("video", self.video)] {
            if let Some(file) = file {
                parts.push(FormPart::File { name: name.to_owned(), file_name: file.file_name, bytes: file.bytes });
            }
        }
        parts
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumPostOutcome {
    pub post_id: Option<u64>,
    /// Drafts page for a draft, the forum page for a published post.
    pub redirect: String,
}

/// One forum page's post list state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumThread {
    forum_id: u64,
    topic_count: Option<u64>,
}

impl ForumThread {
    /// `topic_count` is the count rendered with the page, if known.
    #[must_use]
    pub fn new(forum_id: u64, topic_count: Option<u64>) -> Self {
        Self { forum_id, topic_count }
    }

    #[must_use]
    pub fn forum_id(&self) -> u64 {
        self.forum_id
    }

    #[must_use]
    pub fn topic_count(&self) -> Option<u64> {
        self.topic_count
    }

    /// Server-relative link to a post, as copied by the share action.
    #[must_use]
    pub fn share_path(&self, post_id: u64) -> String {
        forum_post_page(self.forum_id, post_id)
    }

    /// Validate and upload a post.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` without sending anything when the draft is
    /// incomplete, otherwise the server or transport error.
    pub async fn create_post<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        draft: ForumPostDraft,
    ) -> Result<ForumPostOutcome, ClientError> {
        draft.validate()?;
        let is_draft = draft.save_as_draft;

        let reply = match api.create_forum_post(self.forum_id, draft.into_parts()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(forum_id = self.forum_id, error = %e, "forum post failed");
                return Err(e);
            }
        };

        if !is_draft {
            self.topic_count = self.topic_count.map(|n| n.saturating_add(1));
        }
        tracing::info!(forum_id = self.forum_id, post_id = ?reply.post_id, draft = is_draft, "forum post created");
        let redirect = if is_draft { forum_drafts_page(self.forum_id) } else { forum_page(self.forum_id) };
        Ok(ForumPostOutcome { post_id: reply.post_id, redirect })
    }

    /// Delete a post and refresh the topic count. Returns the new count when
    /// one is known.
    ///
    /// # Errors
    ///
    /// Returns the delete error; the count is unchanged.
    pub async fn delete_post<T: Transport>(
        &mut self,
        api: &ApiClient<T>,
        post_id: u64,
    ) -> Result<Option<u64>, ClientError> {
        let reply = match api.delete_forum_post(post_id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(post_id, error = %e, "failed to delete forum post");
                return Err(e);
            }
        };
        tracing::info!(forum_id = self.forum_id, post_id, "forum post deleted");

        match reply.post_count {
            Some(count) => self.topic_count = Some(count),
            None => self.refresh_topic_count(api).await,
        }
        Ok(self.topic_count)
    }

    /// Re-read the topic count; failures keep the previous value.
    pub async fn refresh_topic_count<T: Transport>(&mut self, api: &ApiClient<T>) {
        match api.topic_count().await {
            Ok(Some(count)) => self.topic_count = Some(count),
            Ok(None) => {}
            Err(e) => tracing::warn!(forum_id = self.forum_id, error = %e, "error fetching topic count"),
        }
    }
}
