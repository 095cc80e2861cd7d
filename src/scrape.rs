//! Content source adapter: pulls candidate discussion threads from Reddit's
//! public JSON listings, one channel at a time, gently enough to stay under
//! the unauthenticated rate limit.

use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

/// Channels are fetched in concurrent groups of this size.
const CHUNK_SIZE: usize = 2;
/// Fixed pause between groups.
const CHUNK_PAUSE: Duration = Duration::from_secs(2);
/// Upper bound of the per-request random jitter.
const MAX_JITTER_MS: u64 = 2000;
/// Posts requested per channel listing.
const POSTS_PER_CHANNEL: u32 = 5;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One scrape target. `window` only applies to time-bounded sorts like `top`.
#[derive(Debug, Clone)]
pub struct SourceChannel {
    pub name: &'static str,
    pub sort: &'static str,
    pub window: Option<&'static str>,
}

impl SourceChannel {
    const fn hot(name: &'static str) -> Self {
        Self {
            name,
            sort: "hot",
            window: None,
        }
    }

    const fn new(name: &'static str) -> Self {
        Self {
            name,
            sort: "new",
            window: None,
        }
    }

    const fn top(name: &'static str, window: &'static str) -> Self {
        Self {
            name,
            sort: "top",
            window: Some(window),
        }
    }
}

/// Curated high-signal startup communities.
pub const SOURCE_CHANNELS: &[SourceChannel] = &[
    SourceChannel::hot("Business_Ideas"),
    SourceChannel::hot("SaaS"),
    SourceChannel::hot("webdev"),
    SourceChannel::new("SideProject"),
    SourceChannel::top("smallbusiness", "week"),
    SourceChannel::new("roastmystartup"),
    SourceChannel::hot("GrowthHacking"),
    SourceChannel::hot("indiehackers"),
    SourceChannel::hot("startups"),
    SourceChannel::hot("nocode"),
    SourceChannel::hot("Entrepreneur"),
    SourceChannel::hot("InternetIsBeautiful"),
    SourceChannel::hot("startup"),
    SourceChannel::new("ProductHunters"),
    SourceChannel::new("Startup_Ideas"),
];

#[derive(Debug, Clone)]
pub struct RawPost {
    pub channel: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub score: i64,
    pub created_at: f64,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Deserialize)]
struct PostData {
    subreddit: String,
    title: String,
    #[serde(default)]
    selftext: String,
    url: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
}

/// Fetches every configured channel in small concurrent groups with jitter.
/// A failed channel contributes an empty result; the scrape never aborts.
pub async fn scrape_all(http: &Client, channels: &[SourceChannel]) -> Vec<RawPost> {
    let mut all_posts = Vec::new();

    for chunk in channels.chunks(CHUNK_SIZE) {
        let fetches = chunk.iter().map(|channel| {
            let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MS);
            async move {
                sleep(Duration::from_millis(jitter)).await;
                info!(channel = channel.name, sort = channel.sort, "scraping channel");
                fetch_channel(http, channel).await
            }
        });

        for posts in join_all(fetches).await {
            all_posts.extend(posts);
        }

        sleep(CHUNK_PAUSE).await;
    }

    info!(total = all_posts.len(), "scrape complete");
    all_posts
}

/// One listing fetch, no retry. HTTP or decode failures are logged and
/// collapse to an empty vec.
async fn fetch_channel(http: &Client, channel: &SourceChannel) -> Vec<RawPost> {
    let window = channel.window.unwrap_or("day");
    let url = format!(
        "https://www.reddit.com/r/{}/{}.json?limit={}&t={}",
        channel.name, channel.sort, POSTS_PER_CHANNEL, window
    );

    let response = match http
        .get(&url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(channel = channel.name, error = %err, "channel fetch failed");
            return Vec::new();
        }
    };

    if !response.status().is_success() {
        warn!(
            channel = channel.name,
            status = %response.status(),
            "channel fetch returned error status"
        );
        return Vec::new();
    }

    let listing: Listing = match response.json().await {
        Ok(listing) => listing,
        Err(err) => {
            warn!(channel = channel.name, error = %err, "channel listing did not decode");
            return Vec::new();
        }
    };

    listing
        .data
        .children
        .into_iter()
        .map(|child| RawPost {
            channel: child.data.subreddit,
            title: child.data.title,
            body: child.data.selftext,
            url: child.data.url,
            score: child.data.score,
            created_at: child.data.created_utc,
        })
        .collect()
}
