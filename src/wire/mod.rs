use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// ========================================
/// Generation request/response data model
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meta,
    Google,
    Tiktok,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::Meta, Platform::Google, Platform::Tiktok, Platform::Linkedin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meta => "meta",
            Platform::Google => "google",
            Platform::Tiktok => "tiktok",
            Platform::Linkedin => "linkedin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Urgent,
    Playful,
    Inspirational,
}

impl Tone {
    pub const ALL: [Tone; 5] = [Tone::Professional, Tone::Casual, Tone::Urgent, Tone::Playful, Tone::Inspirational];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Urgent => "urgent",
            Tone::Playful => "playful",
            Tone::Inspirational => "inspirational",
        }
    }
}

/// The five copy angles every batch must cover, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleGroup {
    Urgency,
    Benefit,
    ProblemSolution,
    SocialProof,
    Curiosity,
}

impl StyleGroup {
    pub const CANONICAL: [StyleGroup; 5] = [
        StyleGroup::Urgency,
        StyleGroup::Benefit,
        StyleGroup::ProblemSolution,
        StyleGroup::SocialProof,
        StyleGroup::Curiosity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleGroup::Urgency => "urgency",
            StyleGroup::Benefit => "benefit",
            StyleGroup::ProblemSolution => "problem-solution",
            StyleGroup::SocialProof => "social-proof",
            StyleGroup::Curiosity => "curiosity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::CANONICAL.into_iter().find(|g| g.as_str() == s)
    }

    /// 1-based position in the canonical order; doubles as the variation id.
    pub fn ordinal(&self) -> usize {
        *self as usize + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetAudience {
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
}

fn null_as_empty<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// `null` and blank strings read as absent; any other value must name a variant.
fn blank_as_none<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => serde_json::from_value(v).map(Some).map_err(D::Error::custom),
    }
}

/// What the marketer asked for. Required fields decode leniently (absent,
/// `null` or blank) so that a missing one surfaces as a client error instead
/// of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub product_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub product_description: String,
    #[serde(default)]
    pub key_benefits: Vec<String>,
    #[serde(default)]
    pub price_point: Option<String>,
    #[serde(default)]
    pub target_audience: TargetAudience,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub platform: Option<Platform>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub tone: Option<Tone>,
}

/// Input that passed the required-field check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub product_name: String,
    pub product_description: String,
    pub key_benefits: Vec<String>,
    pub price_point: Option<String>,
    pub target_audience: TargetAudience,
    pub platform: Platform,
    pub tone: Tone,
    pub raw: GenerationInput,
}

impl GenerationInput {
    /// Required: product name, description, platform and tone.
    pub fn validated(&self) -> Option<ValidatedInput> {
        if self.product_name.trim().is_empty() || self.product_description.trim().is_empty() {
            return None;
        }
        Some(ValidatedInput {
            product_name: self.product_name.clone(),
            product_description: self.product_description.clone(),
            key_benefits: self.key_benefits.iter().take(3).cloned().collect(),
            price_point: self.price_point.clone(),
            target_audience: self.target_audience.clone(),
            platform: self.platform?,
            tone: self.tone?,
            raw: self.clone(),
        })
    }
}

/// Brand-kit steering context. Every field may be blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandVoice {
    #[serde(default)]
    pub tone_preset: Option<String>,
    #[serde(default)]
    pub tone_of_voice: Option<String>,
    #[serde(default)]
    pub sample_copy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyVariation {
    pub id: String,
    pub style_group: StyleGroup,
    pub headline: String,
    pub primary_text: String,
    pub description: String,
    pub cta: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub system: String,
    pub user: String,
}

/// Sampling knobs handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub structured_output: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_output_tokens: 2000,
            structured_output: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativeKind {
    Copy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCreative {
    pub user_id: String,
    pub kind: CreativeKind,
    pub platform: Platform,
    pub name: String,
    pub content: Vec<CopyVariation>,
    pub input_params: GenerationInput,
    pub is_favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    pub id: Uuid,
    pub user_id: String,
    pub kind: CreativeKind,
    pub platform: Platform,
    pub name: String,
    pub content: Vec<CopyVariation>,
    pub input_params: GenerationInput,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

/// Success body returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub variations: Vec<CopyVariation>,
    pub credits_used: u32,
    pub credits_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub demo_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub credits_used: u32,
    pub credits_limit: u32,
    pub remaining: u32,
}

impl UsageSummary {
    pub fn new(credits_used: u32, credits_limit: u32) -> Self {
        Self {
            credits_used,
            credits_limit,
            remaining: credits_limit.saturating_sub(credits_used),
        }
    }
}
