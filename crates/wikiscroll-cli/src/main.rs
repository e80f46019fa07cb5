use clap::{Parser, Subcommand};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::error::Error;
use std::time::Duration;
use url::Url;

#[derive(Parser)]
#[command(name = "wikiscroll")]
#[command(about = "A CLI for the WikiScroll feed service")]
struct Cli {
    /// Base URL for the WikiScroll service
    #[arg(long, default_value = "http://localhost:3000")]
    service_url: String,

    /// Act as this signed-in user
    #[arg(long, global = true)]
    user: Option<String>,

    /// Device id used for anonymous client state
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a post by hand
    Add {
        title: String,
        summary: String,
        /// Wikipedia page the post summarises
        #[arg(short, long)]
        source_url: String,
        #[arg(short, long, default_value = "")]
        image_url: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Ask the content generator for a new post
    Generate {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Feed session commands
    Feed {
        #[command(subcommand)]
        command: FeedCommand,
    },
    /// Show an item, wait for the dwell time and report the view
    View {
        session: String,
        position: usize,
        /// How long the item stays visible before the view is reported
        #[arg(long, default_value_t = 1100)]
        dwell_ms: u64,
    },
    /// Toggle a like
    Like { post_id: i32 },
    /// Toggle a save
    Save { post_id: i32 },
    /// Print share links for a post
    Share { post_id: i32 },
    /// Browse the library
    Library {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// all, viewed or unviewed
        #[arg(long)]
        viewed: Option<String>,
        /// newest, oldest, most_viewed or title
        #[arg(long)]
        sort: Option<String>,
        #[arg(short, long, default_value_t = 0)]
        page: u32,
    },
    /// Reading statistics and achievements
    Stats,
}

#[derive(Subcommand)]
enum FeedCommand {
    /// Open a new session
    Open {
        /// Preferred categories, overriding the profile
        #[arg(short, long)]
        category: Vec<String>,
    },
    /// Print a session
    Show { session: String },
    /// Load the next batch
    More { session: String },
    /// Close a session
    Close { session: String },
}

#[derive(Serialize)]
struct NewPost {
    title: String,
    summary: String,
    image_url: String,
    source_url: String,
    category: Option<String>,
}

#[derive(Deserialize)]
struct PostResponse {
    id: i32,
    title: String,
    category: Option<String>,
}

#[derive(Deserialize)]
struct ReactionResponse {
    reaction: String,
    active: bool,
}

#[derive(Deserialize)]
struct TrackResponse {
    status: String,
    retry_after_ms: Option<u64>,
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct Notification {
    title: String,
    message: String,
}

struct Api {
    client: Client,
    base: Url,
    user: Option<String>,
    device: Option<String>,
}

impl Api {
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, Box<dyn Error>> {
        let endpoint = self.base.join(path)?;
        let mut request = self.client.request(method, endpoint);
        if let Some(user) = &self.user {
            request = request.header("x-user-id", user);
        }
        if let Some(device) = &self.device {
            request = request.header("x-device-id", device);
        }
        Ok(request)
    }
}

/// Returns the response on success, otherwise prints the error body.
async fn check(response: Response) -> Result<Option<Response>, Box<dyn Error>> {
    if response.status().is_success() {
        return Ok(Some(response));
    }
    eprintln!("Request failed: {}", response.status());
    eprintln!("Response: {}", response.text().await?);
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base: Url::parse(&cli.service_url)?,
        user: cli.user,
        device: cli.device,
    };

    match cli.command {
        Commands::Add {
            title,
            summary,
            source_url,
            image_url,
            category,
        } => {
            let payload = NewPost {
                title,
                summary,
                image_url,
                source_url,
                category,
            };
            let request = api.request(Method::POST, "/api/v1/posts")?.json(&payload);
            if let Some(response) = check(request.send().await?).await? {
                let post: PostResponse = response.json().await?;
                println!("Post stored with ID: {}", post.id);
            }
        }
        Commands::Generate { category } => {
            let request = api
                .request(Method::POST, "/api/v1/posts/generate")?
                .json(&json!({ "category": category }));
            if let Some(response) = check(request.send().await?).await? {
                let post: PostResponse = response.json().await?;
                println!(
                    "Generated post {}: {} ({})",
                    post.id,
                    post.title,
                    post.category.as_deref().unwrap_or("Generale")
                );
            }
        }
        Commands::Feed { command } => feed(&api, command).await?,
        Commands::View {
            session,
            position,
            dwell_ms,
        } => view(&api, &session, position, dwell_ms).await?,
        Commands::Like { post_id } => toggle(&api, post_id, "like").await?,
        Commands::Save { post_id } => toggle(&api, post_id, "save").await?,
        Commands::Share { post_id } => {
            let path = format!("/api/v1/posts/{post_id}/share");
            if let Some(response) = check(api.request(Method::GET, &path)?.send().await?).await? {
                print_json(&response.json::<Value>().await?)?;
            }
        }
        Commands::Library {
            search,
            category,
            viewed,
            sort,
            page,
        } => {
            let mut query = vec![("page", page.to_string())];
            query.extend(search.map(|v| ("search", v)));
            query.extend(category.map(|v| ("category", v)));
            query.extend(viewed.map(|v| ("viewed", v)));
            query.extend(sort.map(|v| ("sort", v)));

            let request = api.request(Method::GET, "/api/v1/library")?.query(&query);
            if let Some(response) = check(request.send().await?).await? {
                let library: Value = response.json().await?;
                print_items(&library["items"]);
                println!(
                    "Page {} of {} posts, more: {}",
                    library["page"], library["total"], library["has_more"]
                );
            }
        }
        Commands::Stats => {
            let request = api.request(Method::GET, "/api/v1/profile/stats")?;
            if let Some(response) = check(request.send().await?).await? {
                print_json(&response.json::<Value>().await?)?;
            }
        }
    }

    Ok(())
}

async fn feed(api: &Api, command: FeedCommand) -> Result<(), Box<dyn Error>> {
    match command {
        FeedCommand::Open { category } => {
            let mut request = api.request(Method::POST, "/api/v1/feed/sessions")?;
            if !category.is_empty() {
                request = request.json(&json!({ "categories": category }));
            }
            if let Some(response) = check(request.send().await?).await? {
                let session: Value = response.json().await?;
                println!("Session: {}", session["id"].as_str().unwrap_or_default());
                print_items(&session["items"]);
            }
        }
        FeedCommand::Show { session } => {
            let path = format!("/api/v1/feed/sessions/{session}");
            if let Some(response) = check(api.request(Method::GET, &path)?.send().await?).await? {
                let session: Value = response.json().await?;
                print_items(&session["items"]);
                println!(
                    "Position {}, {} items left",
                    session["position"], session["remaining"]
                );
            }
        }
        FeedCommand::More { session } => {
            let path = format!("/api/v1/feed/sessions/{session}/more");
            if let Some(response) = check(api.request(Method::POST, &path)?.send().await?).await? {
                print_json(&response.json::<Value>().await?)?;
            }
        }
        FeedCommand::Close { session } => {
            let path = format!("/api/v1/feed/sessions/{session}");
            if check(api.request(Method::DELETE, &path)?.send().await?)
                .await?
                .is_some()
            {
                println!("Session closed");
            }
        }
    }
    Ok(())
}

async fn view(
    api: &Api,
    session: &str,
    position: usize,
    dwell_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let item_path = format!("/api/v1/feed/sessions/{session}/items/{position}");

    let visible = api
        .request(Method::POST, &format!("{item_path}/visible"))?
        .send()
        .await?;
    let Some(visible) = check(visible).await? else {
        return Ok(());
    };
    let visible: Value = visible.json().await?;
    println!(
        "Showing: {}",
        visible["item"]["title"].as_str().unwrap_or_default()
    );

    tokio::time::sleep(Duration::from_millis(dwell_ms)).await;

    let viewed = api
        .request(Method::POST, &format!("{item_path}/viewed"))?
        .send()
        .await?;
    if let Some(viewed) = check(viewed).await? {
        let outcome: TrackResponse = viewed.json().await?;
        match outcome.retry_after_ms {
            Some(ms) => println!("View {}: retry in {ms} ms", outcome.status),
            None => println!("View {}", outcome.status),
        }
        for notification in outcome.notifications {
            println!("{} {}", notification.title, notification.message);
        }
    }

    let hidden = api
        .request(Method::POST, &format!("{item_path}/hidden"))?
        .send()
        .await?;
    check(hidden).await?;
    Ok(())
}

async fn toggle(api: &Api, post_id: i32, reaction: &str) -> Result<(), Box<dyn Error>> {
    let path = format!("/api/v1/posts/{post_id}/{reaction}/toggle");
    if let Some(response) = check(api.request(Method::POST, &path)?.send().await?).await? {
        let state: ReactionResponse = response.json().await?;
        let verb = if state.active { "on" } else { "off" };
        println!("{} {verb} for post {post_id}", state.reaction);
    }
    Ok(())
}

fn print_items(items: &Value) {
    let Some(items) = items.as_array() else {
        return;
    };
    for (position, item) in items.iter().enumerate() {
        match item["type"].as_str() {
            Some("ad") => println!(
                "{position:>3}  [ad] {} ({})",
                item["title"].as_str().unwrap_or_default(),
                item["advertiser"].as_str().unwrap_or_default()
            ),
            _ => println!(
                "{position:>3}  #{} {} [{}]",
                item["id"],
                item["title"].as_str().unwrap_or_default(),
                item["category"].as_str().unwrap_or("Generale")
            ),
        }
    }
}

fn print_json(value: &Value) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
