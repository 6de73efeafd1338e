//! Forum post suggestions and recent map searches.
//!
//! DESIGN
//! ======
//! `SuggestionSearch` separates the keystroke rules (`prepare`) from the
//! lookup (`resolve`) so both can be tested without timers. `run` wires them
//! to an input channel with a debounce: every new input resets the timer, so
//! only the last query of a burst reaches the server.
//!
//! The cache holds the last non-empty result set. A query equal to the cached
//! one is answered from the cache; a short query clears it.

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::transport::Transport;
use crate::net::types::PostSuggestion;

pub const MIN_QUERY_CHARS: usize = 2;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const MAX_RECENT_SEARCHES: usize = 5;

/// Anything that can turn a query into post suggestions.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggestions(&self, query: &str) -> Result<Vec<PostSuggestion>, ClientError>;
}

/// Suggestions scoped to one forum via `/forums/search/posts/`.
pub struct ForumPostSearch<T> {
    api: ApiClient<T>,
    forum_id: u64,
}

impl<T> ForumPostSearch<T> {
    pub fn new(api: ApiClient<T>, forum_id: u64) -> Self {
        Self { api, forum_id }
    }
}

#[async_trait]
impl<T: Transport> SuggestionSource for ForumPostSearch<T> {
    async fn suggestions(&self, query: &str) -> Result<Vec<PostSuggestion>, ClientError> {
        self.api.search_forum_posts(self.forum_id, query).await
    }
}

/// What the suggestion dropdown should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Hide the dropdown.
    Cleared,
    Suggestions(Vec<PostSuggestion>),
    NoResults(String),
    Error(String),
}

pub struct SuggestionSearch<S> {
    source: S,
    debounce: Duration,
    last_query: String,
    cached: Vec<PostSuggestion>,
}

impl<S: SuggestionSource> SuggestionSearch<S> {
    pub fn new(source: S) -> Self {
        Self::with_debounce(source, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(source: S, debounce: Duration) -> Self {
        Self { source, debounce, last_query: String::new(), cached: Vec::new() }
    }

    #[must_use]
    pub fn cached(&self) -> &[PostSuggestion] {
        &self.cached
    }

    #[must_use]
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    /// Cached results to re-show when the input regains focus unchanged.
    #[must_use]
    pub fn on_focus(&self, raw: &str) -> Option<SearchOutcome> {
        (!self.cached.is_empty() && raw.trim() == self.last_query)
            .then(|| SearchOutcome::Suggestions(self.cached.clone()))
    }

    /// Apply keystroke rules. Returns the trimmed query to look up after the
    /// debounce, or `None` when the input is too short (cache cleared).
    pub fn prepare(&mut self, raw: &str) -> Option<String> {
        let query = raw.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            self.cached.clear();
            self.last_query.clear();
            return None;
        }
        Some(query.to_owned())
    }

    /// Look up a prepared query, answering repeats from the cache.
    pub async fn resolve(&mut self, query: &str) -> SearchOutcome {
        if query == self.last_query && !self.cached.is_empty() {
            return SearchOutcome::Suggestions(self.cached.clone());
        }

        match self.source.suggestions(query).await {
            Ok(found) if found.is_empty() => SearchOutcome::NoResults(query.to_owned()),
            Ok(found) => {
                self.cached = found.clone();
                query.clone_into(&mut self.last_query);
                SearchOutcome::Suggestions(found)
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "search error");
                SearchOutcome::Error(e.to_string())
            }
        }
    }

    /// Debounce raw inputs from `inputs` and publish outcomes to `outputs`.
    ///
    /// Returns when the input channel closes (after resolving any pending
    /// query) or the output receiver is dropped.
    pub async fn run(&mut self, mut inputs: mpsc::Receiver<String>, outputs: mpsc::Sender<SearchOutcome>) {
        let mut pending: Option<(String, Instant)> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at);
            let outcome = tokio::select! {
                received = inputs.recv() => match received {
                    Some(raw) => match self.prepare(&raw) {
                        Some(query) => {
                            pending = Some((query, Instant::now() + self.debounce));
                            continue;
                        }
                        None => {
                            pending = None;
                            SearchOutcome::Cleared
                        }
                    },
                    None => {
                        if let Some((query, at)) = pending.take() {
                            tokio::time::sleep_until(at).await;
                            let outcome = self.resolve(&query).await;
                            let _ = outputs.send(outcome).await;
                        }
                        return;
                    }
                },
                () = sleep_until_opt(deadline), if deadline.is_some() => {
                    let Some((query, _)) = pending.take() else { continue };
                    self.resolve(&query).await
                }
            };

            if outputs.send(outcome).await.is_err() {
                return;
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    if let Some(at) = deadline {
        tokio::time::sleep_until(at).await;
    }
}

// =============================================================================
// RECENT SEARCHES
// =============================================================================

/// The user's recent map searches, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentSearches {
    items: Vec<String>,
}

impl RecentSearches {
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Move `query` to the front, dropping duplicates and the oldest entries.
    pub fn record(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.items.retain(|q| q != query);
        self.items.insert(0, query.to_owned());
        self.items.truncate(MAX_RECENT_SEARCHES);
    }

    /// Replace the list with the server's history. On failure the list is
    /// emptied and the error logged.
    pub async fn load<T: Transport>(&mut self, api: &ApiClient<T>) {
        match api.recent_searches().await {
            Ok(queries) => {
                self.items.clear();
                for query in queries {
                    if !self.items.contains(&query) {
                        self.items.push(query);
                    }
                }
                self.items.truncate(MAX_RECENT_SEARCHES);
            }
            Err(e) => {
                tracing::warn!(error = %e, "error fetching recent searches");
                self.items.clear();
            }
        }
    }

    /// Persist `query` server-side and record it locally. A failed save is
    /// logged and otherwise ignored.
    pub async fn save<T: Transport>(&mut self, api: &ApiClient<T>, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        if let Err(e) = api.save_search(query).await {
            tracing::warn!(query, error = %e, "error saving search");
        }
        self.record(query);
    }
}
