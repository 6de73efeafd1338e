//! Infinite-scroll feed pagination, post actions, and per-post comments.
//!
//! DESIGN
//! ======
//! Page position, the in-flight flag and the "more pages" flag live on the
//! session instead of in page globals. `load_more` clears `loading` on every
//! exit path, so a failed page never wedges the feed.

#[cfg(test)]
#[path = "feed_test.rs"]
mod feed_test;

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::transport::Transport;
use crate::net::types::FeedPost;

/// Pixels before the last post's bottom edge at which the next page loads.
pub const SCROLL_THRESHOLD_PX: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedSession {
    current_page: u32,
    loading: bool,
    has_more: bool,
    trending: bool,
    posts: Vec<FeedPost>,
}

impl FeedSession {
    /// Session for a server-rendered first page; `has_more` comes from the template.
    #[must_use]
    pub fn new(trending: bool, has_more: bool) -> Self {
        Self { current_page: 1, loading: false, has_more, trending, posts: Vec::new() }
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn trending(&self) -> bool {
        self.trending
    }

    /// Posts appended by `load_more`, oldest page first.
    #[must_use]
    pub fn posts(&self) -> &[FeedPost] {
        &self.posts
    }

    /// Whether a scroll position warrants fetching the next page.
    #[must_use]
    pub fn should_load(&self, last_item_bottom: f64, viewport_bottom: f64) -> bool {
        !self.loading && self.has_more && viewport_bottom > last_item_bottom - SCROLL_THRESHOLD_PX
    }

    /// Fetch and append the next page. Returns how many posts were added;
    /// `0` without a request when a load is in flight or nothing is left.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; page position and `has_more` are unchanged.
    pub async fn load_more<T: Transport>(&mut self, api: &ApiClient<T>) -> Result<usize, ClientError> {
        if self.loading || !self.has_more {
            return Ok(0);
        }
        self.loading = true;
        let next_page = self.current_page.saturating_add(1);
        let result = api.feed_page(next_page, self.trending).await;
        self.loading = false;

        match result {
            Ok(page) => {
                let added = page.posts.len();
                self.posts.extend(page.posts);
                self.current_page = page.current_page;
                self.has_more = page.has_next;
                tracing::debug!(page = self.current_page, added, has_more = self.has_more, "feed page loaded");
                Ok(added)
            }
            Err(e) => {
                tracing::warn!(page = next_page, error = %e, "error loading more posts");
                Err(e)
            }
        }
    }

    /// Delete a post and drop it from the loaded list.
    ///
    /// # Errors
    ///
    /// Returns the request error; the list is left untouched.
    pub async fn delete_post<T: Transport>(&mut self, api: &ApiClient<T>, post_id: u64) -> Result<(), ClientError> {
        if let Err(e) = api.delete_feed_post(post_id).await {
            tracing::warn!(post_id, error = %e, "failed to delete post");
            return Err(e);
        }
        self.posts.retain(|p| p.id != post_id);
        tracing::info!(post_id, "post deleted");
        Ok(())
    }
}

/// Comment section under one feed post.
///
/// The server renders the list; the client keeps the latest markup and the
/// post's comment count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPostComments {
    post_id: u64,
    comments_count: Option<u64>,
    html: String,
}

impl FeedPostComments {
    #[must_use]
    pub fn new(post_id: u64) -> Self {
        Self { post_id, comments_count: None, html: String::new() }
    }

    #[must_use]
    pub fn post_id(&self) -> u64 {
        self.post_id
    }

    #[must_use]
    pub fn comments_count(&self) -> Option<u64> {
        self.comments_count
    }

    #[must_use]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Fetch the rendered comment list.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the previous markup is kept.
    pub async fn load<T: Transport>(&mut self, api: &ApiClient<T>) -> Result<&str, ClientError> {
        match api.feed_post_comments(self.post_id).await {
            Ok(html) => {
                self.html = html;
                Ok(&self.html)
            }
            Err(e) => {
                tracing::warn!(post_id = self.post_id, error = %e, "error loading comments");
                Err(e)
            }
        }
    }

    /// Post a comment, then reload the list. Returns the updated count.
    ///
    /// A failed reload after a successful post is logged only; the comment
    /// exists either way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank content without sending anything,
    /// otherwise the post error.
    pub async fn submit<T: Transport>(&mut self, api: &ApiClient<T>, content: &str) -> Result<Option<u64>, ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::InvalidInput("comment content is empty".into()));
        }

        let count = api.post_feed_comment(self.post_id, content).await?;
        if count.is_some() {
            self.comments_count = count;
        }
        tracing::info!(post_id = self.post_id, "feed comment posted");

        // Already logged inside `load`.
        let _ = self.load(api).await;
        Ok(self.comments_count)
    }
}
