use super::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::test_helpers::{ScriptedTransport, client_with_csrf, client_without_csrf};

#[derive(Clone, Default)]
struct MockSource {
    replies: Arc<Mutex<VecDeque<Result<Vec<PostSuggestion>, ClientError>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSource {
    fn reply(&self, reply: Result<Vec<PostSuggestion>, ClientError>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionSource for MockSource {
    async fn suggestions(&self, query: &str) -> Result<Vec<PostSuggestion>, ClientError> {
        self.queries.lock().unwrap().push(query.to_owned());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn suggestion(title: &str) -> PostSuggestion {
    PostSuggestion {
        title: title.to_owned(),
        url: format!("/forums/post/{}/", title.len()),
        author: "ada".to_owned(),
        created_at: "Oct 15, 2026".to_owned(),
        media: None,
    }
}

// =============================================================
// Keystroke rules and cache
// =============================================================

#[tokio::test]
async fn short_query_clears_cache_without_request() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("rust meetup")]));
    let mut search = SuggestionSearch::new(source.clone());

    let query = search.prepare(" ru ").unwrap();
    search.resolve(&query).await;
    assert_eq!(search.cached().len(), 1);

    assert_eq!(search.prepare("r"), None);
    assert_eq!(search.prepare("   "), None);
    assert!(search.cached().is_empty());
    assert_eq!(search.last_query(), "");
    assert_eq!(source.queries(), vec!["ru".to_owned()]);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("hackathon"), suggestion("hack night")]));
    let mut search = SuggestionSearch::new(source.clone());

    let first = search.resolve("hack").await;
    let second = search.resolve("hack").await;

    assert_eq!(first, second);
    assert!(matches!(first, SearchOutcome::Suggestions(ref s) if s.len() == 2));
    assert_eq!(source.queries().len(), 1);
}

#[tokio::test]
async fn empty_result_reports_no_results_and_keeps_cache() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("chess club")])).reply(Ok(Vec::new()));
    let mut search = SuggestionSearch::new(source.clone());

    search.resolve("chess").await;
    let outcome = search.resolve("chessboxing").await;

    assert_eq!(outcome, SearchOutcome::NoResults("chessboxing".to_owned()));
    assert_eq!(search.last_query(), "chess");
    assert_eq!(search.cached().len(), 1);
}

#[tokio::test]
async fn source_error_becomes_error_outcome() {
    let source = MockSource::default();
    source.reply(Err(ClientError::Network("offline".into())));
    let mut search = SuggestionSearch::new(source);

    let outcome = search.resolve("robotics").await;

    assert!(matches!(outcome, SearchOutcome::Error(ref msg) if msg.contains("offline")));
    assert!(search.cached().is_empty());
}

#[tokio::test]
async fn focus_redisplays_cache_for_unchanged_input() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("film night")]));
    let mut search = SuggestionSearch::new(source);

    assert_eq!(search.on_focus("film"), None);
    search.resolve("film").await;

    assert!(matches!(search.on_focus(" film "), Some(SearchOutcome::Suggestions(_))));
    assert_eq!(search.on_focus("films"), None);
}

// =============================================================
// Debounce loop
// =============================================================

#[tokio::test(start_paused = true)]
async fn burst_of_inputs_sends_only_the_last_query() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("career fair")]));
    let mut search = SuggestionSearch::new(source.clone());
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);

    let typing = async move {
        for raw in ["ca", "car", "care", "career"] {
            in_tx.send(raw.to_owned()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };
    tokio::join!(search.run(in_rx, out_tx), typing);

    assert_eq!(source.queries(), vec!["career".to_owned()]);
    assert!(matches!(out_rx.recv().await, Some(SearchOutcome::Suggestions(_))));
    assert_eq!(out_rx.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn short_input_cancels_pending_lookup() {
    let source = MockSource::default();
    let mut search = SuggestionSearch::new(source.clone());
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);

    let typing = async move {
        in_tx.send("pizza".to_owned()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        in_tx.send("p".to_owned()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    };
    tokio::join!(search.run(in_rx, out_tx), typing);

    assert!(source.queries().is_empty());
    assert_eq!(out_rx.recv().await, Some(SearchOutcome::Cleared));
    assert_eq!(out_rx.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn pending_query_resolves_when_input_closes() {
    let source = MockSource::default();
    source.reply(Ok(vec![suggestion("book swap")]));
    let mut search = SuggestionSearch::new(source.clone());
    let (in_tx, in_rx) = mpsc::channel(8);
    let (out_tx, mut out_rx) = mpsc::channel(8);

    in_tx.send("book".to_owned()).await.unwrap();
    drop(in_tx);
    search.run(in_rx, out_tx).await;

    assert_eq!(source.queries(), vec!["book".to_owned()]);
    assert!(matches!(out_rx.recv().await, Some(SearchOutcome::Suggestions(_))));
}

#[tokio::test]
async fn forum_search_scopes_query_to_forum() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        serde_json::json!({ "suggestions": [{
            "title": "Intro thread", "url": "/forums/post/3/", "author": "ada",
            "created_at": "Oct 1, 2026", "media": null
        }] }),
    );
    let source = ForumPostSearch::new(client_without_csrf(&transport), 12);

    let found = source.suggestions("intro").await.unwrap();

    assert_eq!(found[0].title, "Intro thread");
    let request = &transport.requests()[0];
    assert_eq!(request.path, "/forums/search/posts/");
    assert_eq!(
        request.query,
        vec![("q".to_owned(), "intro".to_owned()), ("forum_id".to_owned(), "12".to_owned())]
    );
}

// =============================================================
// Recent searches
// =============================================================

#[test]
fn record_keeps_newest_first_without_duplicates() {
    let mut recent = RecentSearches::default();
    for q in ["library", "gym", "cafe", "gym", "lab", "stadium", "hall", " "] {
        recent.record(q);
    }
    assert_eq!(recent.items(), ["hall", "stadium", "lab", "gym", "cafe"]);
}

#[tokio::test]
async fn load_takes_first_five_server_queries() {
    let transport = ScriptedTransport::new();
    let searches: Vec<serde_json::Value> = ["a", "b", "a", "c", "d", "e", "f"]
        .iter()
        .map(|q| serde_json::json!({ "query": q }))
        .collect();
    transport.push_json(200, serde_json::Value::Array(searches));
    let api = client_without_csrf(&transport);
    let mut recent = RecentSearches::default();

    recent.load(&api).await;

    assert_eq!(recent.items(), ["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn failed_load_empties_the_list() {
    let transport = ScriptedTransport::new();
    transport.push_text(500, "<h1>Server Error</h1>");
    let api = client_without_csrf(&transport);
    let mut recent = RecentSearches::default();
    recent.record("old");

    recent.load(&api).await;

    assert!(recent.items().is_empty());
}

#[tokio::test]
async fn failed_save_still_records_locally() {
    let transport = ScriptedTransport::new();
    transport.push_network_error("offline");
    let api = client_with_csrf(&transport);
    let mut recent = RecentSearches::default();

    recent.save(&api, "main library").await;

    assert_eq!(recent.items(), ["main library"]);
    assert_eq!(transport.request_count(), 1);
}
