use crate::rules::default_cta;
use crate::wire::{CopyVariation, StyleGroup, ValidatedInput};

const DESCRIPTION_PREVIEW: usize = 100;

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Placeholder batch for running without a backend: one variation per style
/// group, templated from the input. Pure; touches nothing outside the input.
pub fn demo_variations(input: &ValidatedInput) -> Vec<CopyVariation> {
    let description = match input.target_audience.age_range.trim() {
        "" => "Connect with your audience like never before.".to_string(),
        age => format!("Perfect for {age}"),
    };
    let primary_text = format!(
        "Discover the power of {}. {}... This is a demo response. Configure a generation backend to get real AI-generated copy.",
        input.product_name,
        preview(&input.product_description, DESCRIPTION_PREVIEW),
    );

    StyleGroup::CANONICAL
        .into_iter()
        .map(|style| CopyVariation {
            id: format!("demo-{}", style.ordinal()),
            style_group: style,
            headline: format!("{} - {} Demo", input.product_name, capitalize(style.as_str())),
            primary_text: primary_text.clone(),
            description: description.clone(),
            cta: default_cta(input.tone).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{GenerationInput, Platform, TargetAudience, Tone};

    fn input(age: &str, description: &str) -> ValidatedInput {
        GenerationInput {
            product_name: "EcoBottle Pro".into(),
            product_description: description.into(),
            target_audience: TargetAudience { age_range: age.into(), ..Default::default() },
            platform: Some(Platform::Meta),
            tone: Some(Tone::Urgent),
            ..Default::default()
        }
        .validated()
        .unwrap()
    }

    #[test]
    fn one_variation_per_style_in_canonical_order() {
        let out = demo_variations(&input("25-34", "Reusable insulated water bottle"));
        let styles: Vec<_> = out.iter().map(|v| v.style_group).collect();
        assert_eq!(styles, StyleGroup::CANONICAL);
        assert_eq!(out[0].id, "demo-1");
        assert_eq!(out[2].headline, "EcoBottle Pro - Problem-solution Demo");
        assert_eq!(out[4].description, "Perfect for 25-34");
        assert!(out.iter().all(|v| v.cta == "Get Started Now"));
    }

    #[test]
    fn missing_age_range_uses_generic_description() {
        let out = demo_variations(&input("  ", "x"));
        assert_eq!(out[0].description, "Connect with your audience like never before.");
    }

    #[test]
    fn long_descriptions_are_cut_on_char_boundaries() {
        let long = "é".repeat(150);
        let out = demo_variations(&input("", &long));
        let expected = format!("{}...", "é".repeat(100));
        assert!(out[0].primary_text.contains(&expected));
        assert!(!out[0].primary_text.contains(&"é".repeat(101)));
    }
}
