use crate::rules::{platform_limits, platform_name, style_brief, tone_description};
use crate::wire::{BrandVoice, Instruction, StyleGroup, ValidatedInput};

fn output_contract() -> String {
    let mut objects = Vec::with_capacity(StyleGroup::CANONICAL.len());
    for style in StyleGroup::CANONICAL {
        let body = if style == StyleGroup::Urgency {
            r#"      "headline": "headline text here",
      "primary_text": "primary ad text here",
      "description": "description text here or empty string if not used",
      "cta": "Call to action button text","#
        } else {
            r#"      "headline": "...",
      "primary_text": "...",
      "description": "...",
      "cta": "...","#
        };
        objects.push(format!(
            "    {{\n      \"id\": \"{id}\",\n{body}\n      \"style_group\": \"{style}\"\n    }}",
            id = style.ordinal(),
            style = style.as_str(),
        ));
    }
    format!(
r#"Output ONLY valid JSON in this exact format (no markdown, no code fences, no explanation):
{{
  "variations": [
{objects}
  ]
}}

Every field is a string. "variations" must contain exactly 5 objects, one per style group, in the order above."#,
        objects = objects.join(",\n"),
    )
}

pub fn system_prompt() -> String {
    "You are an expert advertising copywriter specializing in direct-response digital advertising. \
Always respond with a single valid JSON object only; never add prose, markdown or code fences."
        .to_string()
}

fn non_empty(items: &[String]) -> Vec<&str> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
}

fn bullets(items: &[&str]) -> String {
    items.iter().map(|s| format!("  - {s}")).collect::<Vec<_>>().join("\n")
}

/// Brand block content, or `None` when the kit carries nothing usable.
pub fn brand_context(brand: Option<&BrandVoice>) -> Option<String> {
    let brand = brand?;
    let mut parts = Vec::new();
    if let Some(p) = brand.tone_preset.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("Tone preset: {p}"));
    }
    if let Some(v) = brand.tone_of_voice.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("Voice: {v}"));
    }
    if let Some(s) = brand.sample_copy.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("Sample copy style: {s}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(". "))
    }
}

pub fn user_prompt(input: &ValidatedInput, brand: Option<&BrandVoice>) -> String {
    let limits = platform_limits(input.platform);
    let audience = &input.target_audience;

    let mut out = String::new();
    out.push_str("Create compelling ad copy variations that drive clicks and conversions.\n\n");

    out.push_str("PRODUCT INFORMATION:\n");
    out.push_str(&format!("- Name: {}\n", input.product_name.trim()));
    out.push_str(&format!("- Description: {}\n", input.product_description.trim()));
    let benefits = non_empty(&input.key_benefits);
    if !benefits.is_empty() {
        out.push_str(&format!("- Key Benefits:\n{}\n", bullets(&benefits)));
    }
    if let Some(price) = input.price_point.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        out.push_str(&format!("- Price: {price}\n"));
    }

    out.push_str("\nTARGET AUDIENCE:\n");
    out.push_str(&format!("- Age Range: {}\n", audience.age_range.trim()));
    let interests = non_empty(&audience.interests);
    if !interests.is_empty() {
        out.push_str(&format!("- Interests: {}\n", interests.join(", ")));
    }
    let pains = non_empty(&audience.pain_points);
    if !pains.is_empty() {
        out.push_str(&format!("- Pain Points:\n{}\n", bullets(&pains)));
    }

    out.push_str(&format!("\nPLATFORM: {}\n", platform_name(input.platform)));
    out.push_str(&format!("TONE: {}\n", tone_description(input.tone)));

    if let Some(ctx) = brand_context(brand) {
        out.push_str(&format!("\nBRAND VOICE: {ctx}\n"));
    }

    out.push_str("\nCHARACTER LIMITS (STRICT - do not exceed):\n");
    out.push_str(&format!("- Headline: {} characters\n", limits.headline));
    out.push_str(&format!("- Primary Text: {} characters\n", limits.primary_text));
    if limits.uses_description() {
        out.push_str(&format!("- Description: {} characters\n", limits.description));
    } else {
        out.push_str("- Description: Not used for this platform (return an empty string)\n");
    }

    out.push_str("\nGenerate exactly 5 ad copy variations, one for each style:\n");
    for style in StyleGroup::CANONICAL {
        out.push_str(&format!(
            "{}. {} - {}\n",
            style.ordinal(),
            style.as_str().to_uppercase(),
            style_brief(style)
        ));
    }

    out.push('\n');
    out.push_str(&output_contract());
    out
}

/// Assemble the full request. Pure; identical inputs give identical text.
pub fn build_request(input: &ValidatedInput, brand: Option<&BrandVoice>) -> Instruction {
    Instruction {
        system: system_prompt(),
        user: user_prompt(input, brand),
    }
}
