//! Relay configuration command

use anyhow::Result;
use pairkit_lib::ice::RelayConfigClient;
use pairkit_lib::PairingConfig;

use crate::ui;

pub async fn fetch(config: &PairingConfig, url: &str, verbose: bool) -> Result<()> {
    ui::header("Relay Configuration");
    ui::key_value("Source", &RelayConfigClient::config_url(url));

    let client = RelayConfigClient::new(config.relay_config_timeout())?;
    let spinner = ui::progress("Fetching relay configuration...");
    let result = client.fetch(url).await;
    spinner.finish_and_clear();

    let ice = match result {
        Ok(ice) => ice,
        Err(e) => {
            ui::error(&format!("{}", e));
            ui::warning("Sessions using this URL fall back to the default configuration");
            return Ok(());
        }
    };

    ui::success(&format!("{} server(s)", ice.ice_servers.len()));
    if verbose {
        ui::json(&serde_json::to_value(&ice)?);
    }
    Ok(())
}
