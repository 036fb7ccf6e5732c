//! CLI command implementations

pub mod emulate;
pub mod ice;
pub mod token;

use pairkit_lib::PairingConfig;

/// Load the pairing configuration from the environment, with an optional
/// network override from the command line.
pub fn load_config(network: Option<&str>) -> anyhow::Result<PairingConfig> {
    let mut config = PairingConfig::from_env()?;
    if let Some(network) = network {
        config.network = network.parse()?;
    }
    Ok(config)
}
