//! Social media monitoring.
//!
//! No social platform credential ships with the system, so the default
//! deployment serves deterministic mock posts clearly tagged with the mock
//! provider. Posts are ranked with the shared priority scorer, the same one
//! used for classified reports, so feed ordering is consistent across
//! surfaces.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use reliefnet_cache::{CacheStore, text_key};
use reliefnet_core::{Clock, Priority};

use crate::MOCK_PROVIDER;
use crate::analysis::{KeywordClassifier, priority_for_score, priority_score};

/// One monitored social post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: String,
    pub author: String,
    pub content: String,
    pub platform: String,
    /// Like/share magnitude, feeds the engagement bonus of the scorer.
    pub engagement: u64,
    pub priority_score: u8,
    pub priority: Priority,
    pub published_at: DateTime<Utc>,
    /// `"mock"` until a real platform integration is configured.
    pub provider: String,
}

/// A scored page of social posts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialFeed {
    pub posts: Vec<SocialPost>,
    pub total: usize,
}

const MOCK_TEMPLATES: &[(&str, &str, u64)] = &[
    (
        "reliefwatcher",
        "Water levels still rising near {kw}, people trapped on upper floors. Send help",
        1800,
    ),
    (
        "localvolunteer",
        "We have blankets and food available at the community center for anyone affected by {kw}",
        240,
    ),
    (
        "cityalerts",
        "Road closures around the {kw} area, seek alternate routes",
        950,
    ),
    (
        "neighbor_net",
        "Power is out across the district after the {kw}, crews on site",
        60,
    ),
    (
        "firstresponder_fan",
        "Rescue teams doing amazing work near {kw} today",
        15,
    ),
];

/// Social monitoring service serving deterministic mock posts.
pub struct SocialService {
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    cache_ttl: Duration,
}

impl SocialService {
    pub fn new(cache: CacheStore, clock: Arc<dyn Clock>, cache_ttl: Duration) -> Self {
        Self {
            cache,
            clock,
            cache_ttl,
        }
    }

    /// Fetch posts mentioning the disaster's keywords, scored and sorted
    /// with the shared feed ordering. Total, never fails.
    pub async fn fetch_social(&self, disaster_id: &str, keywords: &[String]) -> SocialFeed {
        let subject = format!("{disaster_id}|{}", keywords.join(","));
        let key = text_key("social", MOCK_PROVIDER, &subject);
        if let Some(cached) = self.cache.get_as::<Vec<SocialPost>>(&key).await {
            let total = cached.len();
            return SocialFeed {
                posts: cached,
                total,
            };
        }

        let posts = self.mock_posts(disaster_id, keywords);
        self.cache.set_json(&key, &posts, self.cache_ttl).await;
        let total = posts.len();
        SocialFeed { posts, total }
    }

    fn mock_posts(&self, disaster_id: &str, keywords: &[String]) -> Vec<SocialPost> {
        let keyword = keywords
            .first()
            .map(String::as_str)
            .unwrap_or("the disaster area");
        let now = self.clock.now();

        let mut posts: Vec<SocialPost> = MOCK_TEMPLATES
            .iter()
            .enumerate()
            .map(|(index, (author, template, engagement))| {
                let content = template.replace("{kw}", keyword);
                let classification = KeywordClassifier::classify_text(&content);
                let score = priority_score(&classification, *engagement);

                // Stable ids and a deterministic recency spread derived from
                // the disaster id, so repeated calls agree.
                let mut hasher = DefaultHasher::new();
                disaster_id.hash(&mut hasher);
                index.hash(&mut hasher);
                let minutes_ago = (hasher.finish() % 180) as i64;

                SocialPost {
                    id: format!("social-{disaster_id}-{index}"),
                    author: author.to_string(),
                    content,
                    platform: "mock".to_string(),
                    engagement: *engagement,
                    priority_score: score,
                    priority: priority_for_score(score),
                    published_at: now - Duration::minutes(minutes_ago),
                    provider: MOCK_PROVIDER.to_string(),
                }
            })
            .collect();

        posts.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| b.published_at.cmp(&a.published_at))
        });
        posts
    }
}
