//! Checks the model's raw answer against the five-variation contract and
//! normalizes it into canonical style order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ContractViolation;
use crate::rules::{platform_limits, PlatformLimits};
use crate::wire::{CopyVariation, Platform, StyleGroup};

/// What to do when a field runs past the platform's character budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Accept the batch and report the overrun.
    #[default]
    Soft,
    /// Reject the batch as a contract violation.
    Strict,
}

impl std::str::FromStr for LimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(LimitPolicy::Soft),
            "strict" => Ok(LimitPolicy::Strict),
            other => Err(format!("unknown limit policy `{other}` (expected soft|strict)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitBreach {
    pub style: StyleGroup,
    pub field: &'static str,
    pub len: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub variations: Vec<CopyVariation>,
    pub breaches: Vec<LimitBreach>,
}

fn required_text(obj: &Map<String, Value>, index: usize, field: &'static str, allow_empty: bool) -> Result<String, ContractViolation> {
    match obj.get(field).and_then(Value::as_str) {
        Some(s) if allow_empty || !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(ContractViolation::MissingField { index, field }),
    }
}

fn parse_variation(index: usize, v: &Value) -> Result<CopyVariation, ContractViolation> {
    let obj = v
        .as_object()
        .ok_or_else(|| ContractViolation::InvalidStructure(format!("variation {index} is not an object")))?;

    let style_raw = required_text(obj, index, "style_group", false)?;
    let style_group = StyleGroup::parse(&style_raw.trim().to_ascii_lowercase())
        .ok_or(ContractViolation::UnknownStyle { index, value: style_raw })?;

    Ok(CopyVariation {
        id: style_group.ordinal().to_string(),
        style_group,
        headline: required_text(obj, index, "headline", false)?,
        primary_text: required_text(obj, index, "primary_text", false)?,
        description: required_text(obj, index, "description", true)?,
        cta: required_text(obj, index, "cta", false)?,
    })
}

pub fn check_limits(variations: &[CopyVariation], limits: PlatformLimits) -> Vec<LimitBreach> {
    let mut out = Vec::new();
    for v in variations {
        let fields = [
            ("headline", v.headline.chars().count(), limits.headline),
            ("primary_text", v.primary_text.chars().count(), limits.primary_text),
            ("description", v.description.chars().count(), limits.description),
        ];
        for (field, len, limit) in fields {
            if len > limit {
                out.push(LimitBreach { style: v.style_group, field, len, limit });
            }
        }
    }
    out
}

/// Parse `raw` and enforce the batch contract. The raw payload is logged on
/// failure and never carried in the returned error.
pub fn validate(raw: &str, platform: Platform, policy: LimitPolicy) -> Result<Validated, ContractViolation> {
    if raw.trim().is_empty() {
        return Err(ContractViolation::Empty);
    }

    let top: Value = serde_json::from_str(raw).map_err(|e| {
        tracing::error!(error = %e, payload = %raw, "Failed to parse model output as JSON");
        ContractViolation::Malformed(e.to_string())
    })?;

    let items = match top.get("variations") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            tracing::error!(payload = %raw, "`variations` is not a list");
            return Err(ContractViolation::InvalidStructure("`variations` is not a list".into()));
        }
        None => {
            tracing::error!(payload = %raw, "Model output has no `variations` key");
            return Err(ContractViolation::InvalidStructure("missing `variations`".into()));
        }
    };

    let mut by_style: BTreeMap<StyleGroup, CopyVariation> = BTreeMap::new();
    for (index, item) in items.iter().enumerate() {
        let variation = parse_variation(index, item).inspect_err(|e| {
            tracing::error!(error = %e, payload = %raw, "Model output violates variation schema");
        })?;
        let style = variation.style_group;
        if by_style.insert(style, variation).is_some() {
            tracing::error!(style = style.as_str(), payload = %raw, "Duplicated style group in model output");
            return Err(ContractViolation::DuplicateStyle(style));
        }
    }

    if let Some(missing) = StyleGroup::CANONICAL.into_iter().find(|s| !by_style.contains_key(s)) {
        tracing::error!(style = missing.as_str(), count = items.len(), payload = %raw, "Style group missing from model output");
        return Err(ContractViolation::MissingStyle(missing));
    }

    // BTreeMap iteration follows the enum's declaration order, which is canonical.
    let variations: Vec<CopyVariation> = by_style.into_values().collect();

    let breaches = check_limits(&variations, platform_limits(platform));
    if policy == LimitPolicy::Strict {
        if let Some(b) = breaches.first() {
            return Err(ContractViolation::LimitExceeded {
                style: b.style,
                field: b.field,
                len: b.len,
                limit: b.limit,
            });
        }
    }
    for b in &breaches {
        tracing::warn!(
            style = b.style.as_str(),
            field = b.field,
            len = b.len,
            limit = b.limit,
            platform = platform.as_str(),
            "Model output exceeds platform character limit"
        );
    }

    Ok(Validated { variations, breaches })
}
