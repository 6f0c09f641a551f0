//! Static reference tables: platform character budgets, platform display
//! names, tone descriptions and tier credit limits.

use crate::wire::{Platform, StyleGroup, SubscriptionTier, Tone};

/// Per-platform character ceilings. A `description` of 0 means the
/// platform has no description field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    pub headline: usize,
    pub primary_text: usize,
    pub description: usize,
}

impl PlatformLimits {
    pub fn uses_description(&self) -> bool {
        self.description > 0
    }
}

pub fn platform_limits(platform: Platform) -> PlatformLimits {
    match platform {
        Platform::Meta => PlatformLimits { headline: 40, primary_text: 125, description: 30 },
        Platform::Google => PlatformLimits { headline: 30, primary_text: 90, description: 90 },
        Platform::Tiktok => PlatformLimits { headline: 100, primary_text: 100, description: 0 },
        Platform::Linkedin => PlatformLimits { headline: 70, primary_text: 150, description: 70 },
    }
}

pub fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Meta => "Facebook/Instagram",
        Platform::Google => "Google Ads",
        Platform::Tiktok => "TikTok",
        Platform::Linkedin => "LinkedIn",
    }
}

pub fn tone_description(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "formal, business-appropriate, and credible",
        Tone::Casual => "friendly, conversational, and approachable",
        Tone::Urgent => "creates FOMO, emphasizes scarcity and time-sensitivity",
        Tone::Playful => "fun, lighthearted, and entertaining",
        Tone::Inspirational => "motivating, uplifting, and emotionally resonant",
    }
}

/// Fallback call-to-action used by the demo generator.
pub fn default_cta(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Learn More",
        Tone::Casual => "Check It Out",
        Tone::Urgent => "Get Started Now",
        Tone::Playful => "Why Not?",
        Tone::Inspirational => "Join Us Today",
    }
}

/// One-line brief for each style angle, shown to the model.
pub fn style_brief(style: StyleGroup) -> &'static str {
    match style {
        StyleGroup::Urgency => "Create FOMO, emphasize limited availability or time",
        StyleGroup::Benefit => "Lead with the biggest benefit, focus on what they gain",
        StyleGroup::ProblemSolution => "Start with the pain point, present product as solution",
        StyleGroup::SocialProof => "Imply popularity, trust, or results others have seen",
        StyleGroup::Curiosity => "Use a question or intriguing statement to spark interest",
    }
}

pub fn credit_limit(tier: SubscriptionTier) -> u32 {
    match tier {
        SubscriptionTier::Free => 10,
        SubscriptionTier::Pro => 50,
    }
}
