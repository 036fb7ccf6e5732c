//! Terminal output for pairing sessions.
//!
//! Lines produced while emulating a pairing are tagged with the party that
//! acted, so the two halves of a handshake read as one transcript.

use colored::{ColoredString, Colorize};
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Which side of a pairing an output line belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party {
    /// The dApp showing the code.
    Host,
    /// The wallet scanning it.
    Initiator,
}

impl Party {
    fn tag(self) -> ColoredString {
        match self {
            Party::Host => "[dApp]".magenta(),
            Party::Initiator => "[wallet]".cyan(),
        }
    }
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// A handshake step taken by `party`.
pub fn step(party: Party, text: &str) {
    println!("  {} {}", party.tag(), text);
}

/// Spinner shown while `party` waits on the other side.
pub fn spinner(party: Party, message: &str) -> ProgressBar {
    progress(&format!("{} {}", party.tag(), message))
}

/// Spinner for work outside a pairing, such as an HTTP fetch.
pub fn progress(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Ask the wallet user to approve a request. Without a terminal the
/// request is approved.
pub fn approve(prompt: &str) -> anyhow::Result<bool> {
    if !Term::stdout().is_term() {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(format!("{} {}", Party::Initiator.tag(), prompt))
        .default(true)
        .interact()?)
}

/// Render a pairing code as a terminal QR code.
pub fn render_qr(code: &str) -> anyhow::Result<String> {
    use qrcode::QrCode;

    let qr = QrCode::new(code)?;
    Ok(qr
        .render::<char>()
        .quiet_zone(false)
        .module_dimensions(2, 1)
        .build())
}

/// Print a pairing code, and its QR rendering when `show_qr` is set.
pub fn pairing_code(code: &str, show_qr: bool) -> anyhow::Result<()> {
    key_value("Code", code);
    if show_qr {
        println!("\n{}\n", render_qr(code)?);
    }
    Ok(())
}

pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

pub fn json(value: &serde_json::Value) {
    if let Ok(pretty) = serde_json::to_string_pretty(value) {
        println!("{}", pretty);
    }
}
