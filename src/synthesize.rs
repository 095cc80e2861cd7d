//! Idea synthesizer: turns a pile of scraped posts into at most ten
//! structured idea drafts via the text generation capability.

use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::clients::generation::{GenerationError, TextGenerator};
use crate::scrape::RawPost;

/// Hard cap on drafts per run, first-found priority across batches.
pub const MAX_IDEAS: usize = 10;
const MAX_POSTS_PER_BATCH: usize = 30;
const MAX_BATCHES: usize = 2;
/// Batches smaller than this are not worth a generation call.
const MIN_BATCH_POSTS: usize = 5;
const ATTEMPTS_PER_BATCH: u32 = 3;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);
const BODY_EXCERPT_LEN: usize = 200;

/// Unvalidated structured record parsed out of a generation response or a
/// webhook payload. Aliases cover the field spellings third parties send.
#[derive(Debug, Clone, Deserialize)]
pub struct IdeaDraft {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "tag")]
    pub region: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default, alias = "targetAudience", alias = "target_audience")]
    pub target: Option<String>,
    #[serde(default, alias = "whyItMatters", alias = "why_it_matters")]
    pub why: Option<String>,
    #[serde(default, alias = "sourceUrls", alias = "sources")]
    pub source_links: Vec<String>,
    #[serde(default, alias = "suggestedTags")]
    pub tags: Option<serde_json::Value>,
}

/// Runs the full synthesis pass: substantive filter, shuffle, batch, prompt,
/// parse. Returns at most [`MAX_IDEAS`] drafts; an empty result is a normal
/// "nothing found" outcome.
pub async fn synthesize_ideas(
    generator: &dyn TextGenerator,
    primary_model: &str,
    backup_model: &str,
    posts: &[RawPost],
) -> Vec<IdeaDraft> {
    let mut substantive: Vec<&RawPost> = posts
        .iter()
        .filter(|p| p.body.len() > 50 || p.title.len() > 30)
        .collect();
    info!(
        total = posts.len(),
        substantive = substantive.len(),
        "filtered scraped posts"
    );
    if substantive.is_empty() {
        return Vec::new();
    }

    substantive.shuffle(&mut rand::thread_rng());

    let mut drafts = Vec::new();
    for batch in substantive.chunks(MAX_POSTS_PER_BATCH).take(MAX_BATCHES) {
        if batch.len() <= MIN_BATCH_POSTS {
            continue;
        }
        let prompt = build_prompt(batch);
        if let Some(mut parsed) =
            generate_batch(generator, primary_model, backup_model, &prompt).await
        {
            drafts.append(&mut parsed);
        }
        if drafts.len() >= MAX_IDEAS {
            break;
        }
    }

    drafts.truncate(MAX_IDEAS);
    info!(drafts = drafts.len(), "synthesis complete");
    drafts
}

/// One batch: primary model with an immediate backup-model fallback on any
/// primary failure, then a strict parse of the (possibly fenced) response.
/// The backoff loop only engages when the backup is rate limited too; any
/// other failure abandons the batch.
async fn generate_batch(
    generator: &dyn TextGenerator,
    primary_model: &str,
    backup_model: &str,
    prompt: &str,
) -> Option<Vec<IdeaDraft>> {
    let mut attempts_left = ATTEMPTS_PER_BATCH;
    while attempts_left > 0 {
        let text = match generate_with_fallback(generator, primary_model, backup_model, prompt)
            .await
        {
            Ok(text) => text,
            Err(GenerationError::RateLimited) => {
                attempts_left -= 1;
                warn!(attempts_left, "generation rate limited, backing off");
                if attempts_left == 0 {
                    return None;
                }
                sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            Err(GenerationError::Failed(message)) => {
                warn!(error = %message, "generation failed, abandoning batch");
                return None;
            }
        };

        return match parse_drafts(&text) {
            Ok(drafts) => Some(drafts),
            Err(err) => {
                warn!(error = %err, "generation response did not parse, abandoning batch");
                None
            }
        };
    }
    None
}

async fn generate_with_fallback(
    generator: &dyn TextGenerator,
    primary_model: &str,
    backup_model: &str,
    prompt: &str,
) -> Result<String, GenerationError> {
    match generator.generate(primary_model, prompt).await {
        Ok(text) => Ok(text),
        Err(err) => {
            warn!(
                model = primary_model,
                error = %err,
                "primary model failed, switching to backup"
            );
            generator.generate(backup_model, prompt).await
        }
    }
}

/// Strips markdown code fences and parses the strict JSON array of drafts.
/// No speculative repair: a malformed response is a batch failure.
pub fn parse_drafts(text: &str) -> Result<Vec<IdeaDraft>, serde_json::Error> {
    let clean = text.replace("```json", "").replace("```", "");
    serde_json::from_str(clean.trim())
}

fn build_prompt(posts: &[&RawPost]) -> String {
    let input_data = posts
        .iter()
        .map(|p| {
            let excerpt: String = p.body.chars().take(BODY_EXCERPT_LEN).collect();
            format!("[r/{}] {}: {}...", p.channel, p.title, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert opportunity analyst.
Analyze these Reddit posts to identify recurring pain points and synthesize investable opportunities.

**Heuristics:**
1. "Complex Hack": Spreadsheets + Zapier + Email = Opportunity.
2. "Recurring Question": "How do I..." > 3 times = Opportunity.
3. "Price Gap": Only Enterprise exists = Indie opportunity.
4. "Isolation": Reducing loneliness = High value.

**Input Data:**
{input_data}

**Task:**
Generate 5 distinct, high-quality startup ideas based *only* on the problems found in this text.

**Output Format:**
Strictly a valid JSON array of 5 objects (no markdown, no backticks):
[
  {{
    "name": "One-Word Name",
    "title": "Descriptive Title",
    "tag": "Region/Scope",
    "category": "Industry",
    "problem": "Pain point description.",
    "solution": "MVP solution.",
    "target": "Niche audience.",
    "why": "Market sizing/why now."
  }}
]"#
    )
}
