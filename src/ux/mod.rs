use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::rules::{platform_limits, platform_name};
use crate::wire::{GenerateResponse, Instruction, Platform};

/// Spinner shown while waiting on the generation backend.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn counter(text: &str, limit: usize) -> ColoredString {
    let len = text.chars().count();
    let label = format!("{len}/{limit}");
    if len > limit {
        label.red().bold()
    } else {
        label.dimmed()
    }
}

pub fn show_variations(resp: &GenerateResponse, platform: Platform) {
    let limits = platform_limits(platform);

    println!("\n=== {} ===", platform_name(platform).bold());
    if resp.demo_mode {
        println!("{}", "(demo mode: placeholder copy, no backend configured)".yellow());
    }

    for v in &resp.variations {
        println!("\n{}  {}", format!("[{}]", v.id).cyan().bold(), v.style_group.as_str().to_uppercase().magenta().bold());
        println!("  {:<13}{}  {}", "Headline:", v.headline.bold(), counter(&v.headline, limits.headline));
        println!("  {:<13}{}  {}", "Primary:", v.primary_text, counter(&v.primary_text, limits.primary_text));
        if limits.uses_description() {
            println!("  {:<13}{}  {}", "Description:", v.description, counter(&v.description, limits.description));
        }
        println!("  {:<13}{}", "CTA:", v.cta.green().bold());
    }

    println!(
        "\n{}: {}/{}{}",
        "Credits".bold(),
        resp.credits_used,
        resp.credits_limit,
        match resp.creative_id {
            Some(id) => format!("   saved as {id}"),
            None => String::new(),
        }
    );
}

pub fn show_instruction(ins: &Instruction) {
    println!("{}", "=== SYSTEM ===".bold());
    println!("{}", ins.system);
    println!("\n{}", "=== USER ===".bold());
    println!("{}", ins.user);
}
