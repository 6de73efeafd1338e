mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use campus::comments::{CommentThread, DELETE_COMMENT_CONFIRM_PROMPT};
use campus::feed::{FeedPostComments, FeedSession};
use campus::forum::{DELETE_POST_CONFIRM_PROMPT, ForumPostDraft, ForumThread, MediaFile, PostKind};
use campus::geo::{FixedLocation, IpLocationProvider, LocationProvider, MemorySession, detect_location};
use campus::net::api::ApiClient;
use campus::net::csrf::CsrfToken;
use campus::net::transport::{ApiRequest, HttpTransport, Transport};
use campus::net::types::PostSuggestion;
use campus::registration::{ButtonState, RegistrationController, RegistrationView};
use campus::search::{ForumPostSearch, RecentSearches, SearchOutcome, SuggestionSearch};
use campus::{ClientConfig, ClientError};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalView;

type Api = ApiClient<Arc<HttpTransport>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid --field `{0}`; expected name=value")]
    InvalidField(String),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "campus-cli", about = "Campus events, feeds, forums and maps from the terminal")]
struct Cli {
    #[arg(long, env = "CAMPUS_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CAMPUS_CSRF_TOKEN")]
    csrf_token: Option<String>,

    #[arg(long, env = "CAMPUS_SESSION_COOKIE", help = "Raw Cookie header carrying the session")]
    session_cookie: Option<String>,

    #[arg(long, short = 'y', default_value_t = false, help = "Answer yes to confirmation prompts")]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the registration button and status for an event.
    Status { event_id: u64 },
    /// Poll an event's registration status until Ctrl-C.
    Watch {
        event_id: u64,
        #[arg(long, help = "Poll interval in seconds")]
        interval: Option<u64>,
    },
    /// Register for an event.
    Register {
        event_id: u64,
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
    /// Cancel your registration.
    Cancel { event_id: u64 },
    /// Delete an event you organize.
    DeleteEvent { event_id: u64 },
    /// Update event fields.
    UpdateEvent {
        event_id: u64,
        #[arg(long = "field", value_name = "NAME=VALUE", required = true)]
        fields: Vec<String>,
    },
    Comments(CommentsCommand),
    Feed(FeedCommand),
    Forum(ForumCommand),
    /// Suggest forum posts; reads queries from stdin when none is given.
    Search {
        forum_id: u64,
        query: Option<String>,
    },
    /// Recent map searches.
    Recent,
    /// Save a map search.
    SaveSearch { query: String },
    /// Detect your location for the campus map.
    Locate(LocateArgs),
}

#[derive(Args, Debug)]
struct CommentsCommand {
    #[command(subcommand)]
    command: CommentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum CommentsSubcommand {
    Post {
        event_id: u64,
        content: String,
        #[arg(long)]
        parent: Option<u64>,
    },
    Delete {
        event_id: u64,
        comment_id: String,
        #[arg(long)]
        parent: Option<u64>,
    },
    Like {
        event_id: u64,
        comment_id: u64,
    },
    More {
        event_id: u64,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
}

#[derive(Args, Debug)]
struct FeedCommand {
    #[command(subcommand)]
    command: FeedSubcommand,
}

#[derive(Subcommand, Debug)]
enum FeedSubcommand {
    Load {
        #[arg(long, default_value_t = false)]
        trending: bool,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Like {
        post_id: u64,
        #[arg(long, default_value_t = false, help = "Like a forum post instead of a feed post")]
        forum: bool,
    },
    Delete {
        post_id: u64,
    },
    /// Show the comments under a post.
    Comments {
        post_id: u64,
    },
    /// Comment on a post.
    Comment {
        post_id: u64,
        content: String,
    },
    /// Like or unlike a comment on a post.
    CommentLike {
        comment_id: u64,
    },
    /// Report a post.
    Report {
        post_id: u64,
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct ForumCommand {
    #[command(subcommand)]
    command: ForumSubcommand,
}

#[derive(Subcommand, Debug)]
enum ForumSubcommand {
    /// Create a topic; attaching a file makes it an image/video post.
    Post {
        forum_id: u64,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        video: Option<PathBuf>,
        #[arg(long, default_value_t = false, help = "Save as a draft instead of publishing")]
        draft: bool,
    },
    /// Delete a topic.
    Delete { forum_id: u64, post_id: u64 },
    /// Print the shareable link to a topic.
    Share { forum_id: u64, post_id: u64 },
}

#[derive(Args, Debug)]
struct LocateArgs {
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
    #[arg(long, default_value_t = 50.0)]
    accuracy: f64,
    #[arg(long, default_value_t = false, help = "Skip the IP lookup")]
    no_ip: bool,
    #[arg(long, help = "Print walking directions to this destination")]
    to: Option<String>,
}

struct CliContext {
    config: ClientConfig,
    transport: Arc<HttpTransport>,
    assume_yes: bool,
}

impl CliContext {
    fn api(&self) -> Api {
        ApiClient::new(self.transport.clone(), configured_csrf(&self.config))
    }

    /// Client for a mutating call on `page`, scraping the form token from the
    /// page when none was configured.
    async fn api_for_page(&self, page: &str) -> Result<Api, CliError> {
        let mut api = self.api();
        if !api.has_csrf() {
            api.set_csrf(Some(page_csrf_token(&api, page).await?));
        }
        Ok(api)
    }

    fn view(&self) -> TerminalView<std::io::Stdout> {
        TerminalView::new(std::io::stdout(), &self.config.base_url, self.assume_yes)
    }

    fn controller(&self, event_id: u64, api: Api) -> RegistrationController<Arc<HttpTransport>, TerminalView<std::io::Stdout>> {
        RegistrationController::new(event_id, api, self.view(), self.config.registration.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        base_url.trim_end_matches('/').clone_into(&mut config.base_url);
    }
    if cli.csrf_token.is_some() {
        config.csrf_token = cli.csrf_token;
    }
    if cli.session_cookie.is_some() {
        config.session_cookie = cli.session_cookie;
    }

    let transport = HttpTransport::new(&config.base_url, config.timeouts, config.session_cookie.clone())?;
    let mut ctx = CliContext { config, transport: Arc::new(transport), assume_yes: cli.yes };

    match cli.command {
        Command::Status { event_id } => {
            let mut controller = ctx.controller(event_id, ctx.api());
            controller.refresh_status().await?;
            Ok(())
        }
        Command::Watch { event_id, interval } => {
            if let Some(secs) = interval {
                ctx.config.registration.poll_interval = Duration::from_secs(secs.max(1));
            }
            run_watch(&ctx, event_id).await
        }
        Command::Register { event_id, fields } => {
            let form = parse_fields(&fields)?;
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let mut controller = ctx.controller(event_id, api);
            controller.refresh_status().await?;
            open_registration(&mut controller)?;
            controller.submit_registration(&form).await?;
            Ok(())
        }
        Command::Cancel { event_id } => {
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let mut controller = ctx.controller(event_id, api);
            controller.cancel_registration().await?;
            Ok(())
        }
        Command::DeleteEvent { event_id } => {
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            ctx.controller(event_id, api).delete_event().await?;
            Ok(())
        }
        Command::UpdateEvent { event_id, fields } => {
            let form = parse_fields(&fields)?;
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let reply = ctx.controller(event_id, api).update_event(&form).await?;
            if let Some(updated) = reply.updated_data {
                println!("{}", serde_json::to_string_pretty(&updated)?);
            }
            Ok(())
        }
        Command::Comments(comments) => run_comments(&ctx, comments).await,
        Command::Feed(feed) => run_feed(&ctx, feed).await,
        Command::Forum(forum) => run_forum(&ctx, forum).await,
        Command::Search { forum_id, query } => run_search(&ctx, forum_id, query).await,
        Command::Recent => {
            let mut recent = RecentSearches::default();
            recent.load(&ctx.api()).await;
            for query in recent.items() {
                println!("{query}");
            }
            Ok(())
        }
        Command::SaveSearch { query } => {
            let api = ctx.api_for_page("/maps/").await?;
            let mut recent = RecentSearches::default();
            recent.load(&api).await;
            recent.save(&api, &query).await;
            for query in recent.items() {
                println!("{query}");
            }
            Ok(())
        }
        Command::Locate(args) => run_locate(&ctx, args).await,
    }
}

async fn run_watch(ctx: &CliContext, event_id: u64) -> Result<(), CliError> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });

    let mut controller = ctx.controller(event_id, ctx.api());
    controller.run_polling(rx).await;
    tracing::info!(event_id, polls = controller.status_seq(), "watch finished");
    Ok(())
}

async fn run_comments(ctx: &CliContext, comments: CommentsCommand) -> Result<(), CliError> {
    match comments.command {
        CommentsSubcommand::Post { event_id, content, parent } => {
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let mut thread = CommentThread::new(event_id, false);
            let created = thread.post(&api, &content, parent).await?;
            println!("{}", created.comment_html.trim());
            Ok(())
        }
        CommentsSubcommand::Delete { event_id, comment_id, parent } => {
            let mut view = ctx.view();
            if !view.confirm(DELETE_COMMENT_CONFIRM_PROMPT).await {
                return Ok(());
            }
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let mut thread = CommentThread::new(event_id, false);
            thread.delete(&api, &comment_id, parent).await?;
            println!("Comment deleted successfully");
            Ok(())
        }
        CommentsSubcommand::Like { event_id, comment_id } => {
            let api = ctx.api_for_page(&format!("/events/event/{event_id}/")).await?;
            let thread = CommentThread::new(event_id, false);
            let state = thread.toggle_like(&api, comment_id).await?;
            println!("likes: {} ({})", state.count, if state.liked { "liked" } else { "not liked" });
            Ok(())
        }
        CommentsSubcommand::More { event_id, pages } => {
            let api = ctx.api();
            let mut thread = CommentThread::new(event_id, true);
            for _ in 0..pages {
                let Some(html) = thread.load_more(&api).await? else {
                    break;
                };
                println!("{}", html.trim());
            }
            if !thread.has_next() {
                println!("(no more comments)");
            }
            Ok(())
        }
    }
}

async fn run_feed(ctx: &CliContext, feed: FeedCommand) -> Result<(), CliError> {
    match feed.command {
        FeedSubcommand::Load { trending, pages } => {
            let api = ctx.api();
            let mut session = FeedSession::new(trending, true);
            for _ in 0..pages {
                if session.load_more(&api).await? == 0 {
                    break;
                }
            }
            for post in session.posts() {
                let author = post.author.as_deref().unwrap_or("unknown");
                println!("#{} {author}: {}", post.id, post.content);
            }
            Ok(())
        }
        FeedSubcommand::Like { post_id, forum } => {
            let page = if forum { "/forums/" } else { "/feeds/" };
            let api = ctx.api_for_page(page).await?;
            let state = if forum {
                api.toggle_forum_like(post_id).await?
            } else {
                api.toggle_feed_like(post_id).await?
            };
            println!("likes: {} ({})", state.count, if state.liked { "liked" } else { "not liked" });
            Ok(())
        }
        FeedSubcommand::Delete { post_id } => {
            let api = ctx.api_for_page("/feeds/").await?;
            let mut session = FeedSession::new(false, false);
            session.delete_post(&api, post_id).await?;
            println!("Your post has been deleted.");
            Ok(())
        }
        FeedSubcommand::Comments { post_id } => {
            let mut comments = FeedPostComments::new(post_id);
            println!("{}", comments.load(&ctx.api()).await?.trim());
            Ok(())
        }
        FeedSubcommand::Comment { post_id, content } => {
            let api = ctx.api_for_page("/feeds/").await?;
            let mut comments = FeedPostComments::new(post_id);
            if let Some(count) = comments.submit(&api, &content).await? {
                println!("comments: {count}");
            }
            println!("{}", comments.html().trim());
            Ok(())
        }
        FeedSubcommand::CommentLike { comment_id } => {
            let api = ctx.api_for_page("/feeds/").await?;
            let state = api.toggle_feed_comment_like(comment_id).await?;
            println!("likes: {} ({})", state.count, if state.liked { "liked" } else { "not liked" });
            Ok(())
        }
        FeedSubcommand::Report { post_id, fields } => {
            let fields = parse_fields(&fields)?;
            let api = ctx.api_for_page("/feeds/").await?;
            api.report_feed_post(post_id, &fields).await?;
            println!("Your report has been submitted.");
            Ok(())
        }
    }
}

async fn run_forum(ctx: &CliContext, forum: ForumCommand) -> Result<(), CliError> {
    match forum.command {
        ForumSubcommand::Post { forum_id, title, content, image, video, draft } => {
            let image = read_media(image.as_deref()).await?;
            let video = read_media(video.as_deref()).await?;
            let kind = if image.is_some() || video.is_some() { PostKind::Media } else { PostKind::Text };
            let post = ForumPostDraft { title, content, kind, image, video, save_as_draft: draft };
            // Fail on an incomplete form before fetching the page for its token.
            post.validate()?;

            let api = ctx.api_for_page(&format!("/forums/{forum_id}/")).await?;
            let mut thread = ForumThread::new(forum_id, None);
            let outcome = thread.create_post(&api, post).await?;
            if let Some(post_id) = outcome.post_id {
                println!("posted #{post_id}");
            }
            println!("-> {}{}", ctx.config.base_url, outcome.redirect);
            Ok(())
        }
        ForumSubcommand::Delete { forum_id, post_id } => {
            if !ctx.view().confirm(DELETE_POST_CONFIRM_PROMPT).await {
                return Ok(());
            }
            let api = ctx.api_for_page(&format!("/forums/{forum_id}/")).await?;
            let mut thread = ForumThread::new(forum_id, None);
            match thread.delete_post(&api, post_id).await? {
                Some(count) => println!("Post deleted successfully ({count} topics)"),
                None => println!("Post deleted successfully"),
            }
            Ok(())
        }
        ForumSubcommand::Share { forum_id, post_id } => {
            println!("{}{}", ctx.config.base_url, ForumThread::new(forum_id, None).share_path(post_id));
            Ok(())
        }
    }
}

async fn read_media(path: Option<&Path>) -> Result<Option<MediaFile>, CliError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
    Ok(Some(MediaFile::new(file_name, bytes)))
}

async fn run_search(ctx: &CliContext, forum_id: u64, query: Option<String>) -> Result<(), CliError> {
    let mut search = SuggestionSearch::new(ForumPostSearch::new(ctx.api(), forum_id));

    if let Some(query) = query {
        let outcome = match search.prepare(&query) {
            Some(query) => search.resolve(&query).await,
            None => SearchOutcome::Cleared,
        };
        print_outcome(&outcome);
        return Ok(());
    }

    let (in_tx, in_rx) = mpsc::channel(16);
    let (out_tx, mut out_rx) = mpsc::channel(16);
    let reader = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if in_tx.send(line).await.is_err() {
                break;
            }
        }
        Ok::<(), CliError>(())
    };
    let printer = async move {
        while let Some(outcome) = out_rx.recv().await {
            print_outcome(&outcome);
        }
    };

    let (read, (), ()) = tokio::join!(reader, search.run(in_rx, out_tx), printer);
    read
}

async fn run_locate(ctx: &CliContext, args: LocateArgs) -> Result<(), CliError> {
    let session = MemorySession::default();
    let device = args.lat.zip(args.lng).map(|(lat, lng)| FixedLocation::gps(lat, lng, args.accuracy));
    let ip = IpLocationProvider::new(ctx.transport.clone());

    let mut providers: Vec<&dyn LocationProvider> = Vec::new();
    if let Some(device) = &device {
        providers.push(device);
    }
    if !args.no_ip {
        providers.push(&ip);
    }

    let detection = detect_location(&session, &providers).await;
    let location = detection.location;
    println!(
        "Location detected via {}: {:.4}, {:.4} (±{:.0} m)",
        location.source.as_str(),
        location.lat,
        location.lng,
        location.accuracy
    );
    if let Some(destination) = args.to {
        println!("{}", location.directions_url(&destination)?);
    }
    Ok(())
}

/// Open the sign-up form, refusing unless the button offers registration or
/// an open waiting list.
fn open_registration<T: Transport, V: RegistrationView>(
    controller: &mut RegistrationController<T, V>,
) -> Result<(), CliError> {
    let button = controller.current_button();
    let signs_up = button
        .is_some_and(|b| matches!(b.state, ButtonState::Available | ButtonState::Full) && !b.disabled);
    if signs_up && controller.open_modal() {
        return Ok(());
    }
    let label = button.map_or("status unknown", |b| b.label);
    tracing::warn!(event_id = controller.event_id(), label, "registration button is not accepting sign-ups");
    Err(CliError::Client(ClientError::InvalidInput(format!(
        "registration is not open for this event ({label})"
    ))))
}

fn print_outcome(outcome: &SearchOutcome) {
    match outcome {
        SearchOutcome::Cleared => println!("(type at least 2 characters)"),
        SearchOutcome::Suggestions(found) => {
            for suggestion in found {
                println!("{}", format_suggestion(suggestion));
            }
        }
        SearchOutcome::NoResults(query) => println!("No results found for \"{query}\""),
        SearchOutcome::Error(message) => println!("Error loading suggestions: {message}"),
    }
}

fn format_suggestion(suggestion: &PostSuggestion) -> String {
    let media = match &suggestion.media {
        Some(_) if suggestion.has_video() => " [video]",
        Some(_) => " [image]",
        None => "",
    };
    format!(
        "{}{media} by {} ({}) {}",
        suggestion.title, suggestion.author, suggestion.created_at, suggestion.url
    )
}

/// CSRF token from explicit configuration, then from the session cookie.
fn configured_csrf(config: &ClientConfig) -> Option<CsrfToken> {
    config
        .csrf_token
        .as_deref()
        .and_then(CsrfToken::new)
        .or_else(|| config.session_cookie.as_deref().and_then(CsrfToken::from_cookie_header))
}

async fn page_csrf_token(api: &Api, page: &str) -> Result<CsrfToken, CliError> {
    let response = api.send(ApiRequest::get(page)).await?;
    CsrfToken::from_html(&response.body).ok_or_else(|| {
        tracing::error!(page, "CSRF token not found in page");
        CliError::Client(ClientError::MissingElement("csrfmiddlewaretoken input"))
    })
}

fn parse_fields(raw: &[String]) -> Result<Vec<(String, String)>, CliError> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_owned(), value.to_owned())),
            _ => Err(CliError::InvalidField(pair.clone())),
        })
        .collect()
}
