//! Pairing code encode/decode commands

use anyhow::Result;
use pairkit_lib::token::decode as decode_token;
use pairkit_lib::{validate_scan, FlowType, IdentityToken, PairingConfig};

use crate::ui;

pub fn encode(
    config: &PairingConfig,
    flow: &str,
    token: Option<String>,
    relay_url: Option<String>,
    show_qr: bool,
    verbose: bool,
) -> Result<()> {
    let flow: FlowType = flow.parse()?;
    let relay_url = relay_url.or_else(|| config.relay_config_url.clone());

    let identity = match token {
        Some(token) => IdentityToken::new(config.network, &token, flow, relay_url)?,
        None => IdentityToken::generate(config.network, flow, relay_url),
    };

    ui::header("Pairing Code");
    ui::pairing_code(&identity.display(), show_qr)?;
    if verbose {
        ui::key_value("Dial address", &identity.dial_address());
    }

    ui::separator();
    ui::info(&format!("Scan this code with a {} wallet", identity.network()));
    Ok(())
}

pub fn decode(
    config: &PairingConfig,
    raw: &str,
    expect_flow: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let identity = match expect_flow {
        Some(flow) => validate_scan(raw, config.network, Some(flow.parse()?))?,
        None => decode_token(raw)?,
    };

    ui::header("Decoded Pairing Code");
    ui::key_value("Network", identity.network().as_str());
    ui::key_value("Token", identity.token());
    ui::key_value("Flow", identity.flow().as_str());
    ui::key_value(
        "Relay config",
        identity.relay_config_url().unwrap_or("(default)"),
    );
    if verbose {
        ui::key_value("Dial address", &identity.dial_address());
    }

    if expect_flow.is_some() {
        ui::success("Code is valid for this wallet");
    }
    Ok(())
}
