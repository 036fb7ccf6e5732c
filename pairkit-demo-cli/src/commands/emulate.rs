//! In-process emulation of a pairing.
//!
//! Both parties run in this process over a [`MemoryTransport`]: a dApp host
//! that shows the code and a wallet that scans it. Link faults can be
//! injected to watch the relay fallback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use pairkit_interactive::{
    Fault, MemoryTransport, PairingHost, PairingInitiator, SignOutcome, TransportMode,
};
use pairkit_lib::test_utils::{MockGateway, MockLedger, MockTransaction, TestSigner};
use pairkit_lib::{PairingConfig, Signer, TransactionBlock};

use crate::ui::{self, Party};

#[derive(Args, Debug, Clone, Default)]
pub struct LinkOptions {
    /// Make the direct attempt fail at once so the relay attempt is used
    #[arg(long, conflicts_with = "block_direct")]
    pub relay_only: bool,

    /// Make the direct attempt hang until the open timeout expires
    #[arg(long)]
    pub block_direct: bool,

    /// Per-phase open timeout in milliseconds
    #[arg(long)]
    pub open_timeout_ms: Option<u64>,
}

impl LinkOptions {
    fn apply(&self, transport: &MemoryTransport, config: PairingConfig) -> PairingConfig {
        if self.relay_only {
            transport.set_fault(
                TransportMode::Default,
                Fault::Fail("direct candidates disabled".into()),
            );
        } else if self.block_direct {
            transport.set_fault(TransportMode::Default, Fault::Block);
        }

        match self.open_timeout_ms {
            Some(ms) => config.with_open_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}

struct Emulation {
    transport: MemoryTransport,
    host: PairingHost,
    initiator: PairingInitiator,
    signer: TestSigner,
}

fn setup(config: PairingConfig, link: &LinkOptions) -> Emulation {
    let transport = MemoryTransport::new();
    let config = link.apply(&transport, config);
    let signer = TestSigner::random();

    Emulation {
        host: PairingHost::new(config.clone(), Arc::new(transport.clone())),
        initiator: PairingInitiator::new(config, Arc::new(transport.clone()), Arc::new(signer.clone())),
        transport,
        signer,
    }
}

fn report_link(transport: &MemoryTransport) {
    let modes = transport.dial_modes();
    let used_relay = modes.contains(&TransportMode::RelayOnly);
    ui::key_value("Dial attempts", &modes.len().to_string());
    ui::key_value("Link", if used_relay { "relay" } else { "direct" });
}

pub async fn login(config: PairingConfig, link: &LinkOptions, verbose: bool) -> Result<()> {
    ui::header("Emulated Login");
    let emulation = setup(config, link);

    let session = emulation.host.login_session();
    let qr = session.qr_payload();
    ui::step(Party::Host, "showing code");
    ui::pairing_code(&qr, verbose)?;
    let host = session.spawn().await?;

    ui::step(
        Party::Initiator,
        &format!("scanned, proving {}", emulation.signer.address()),
    );
    let spinner = ui::spinner(Party::Initiator, "connecting...");
    let initiator_result = emulation.initiator.run_login(&qr).await;
    spinner.finish_and_clear();
    let host_result = host.wait().await;

    let outcome = match (initiator_result, host_result) {
        (Ok(_), Ok(outcome)) => outcome,
        (Err(e), _) | (_, Err(e)) => {
            ui::error(&format!("Login failed: {}", e));
            bail!(e);
        }
    };

    ui::step(Party::Host, "proof verified");
    ui::separator();
    ui::success("Logged in");
    ui::key_value("Address", &outcome.address);
    ui::key_value("Network", outcome.network.as_str());
    report_link(&emulation.transport);
    Ok(())
}

pub async fn sign(
    config: PairingConfig,
    link: &LinkOptions,
    sponsored: bool,
    batch: usize,
    yes: bool,
    verbose: bool,
) -> Result<()> {
    if batch == 0 {
        bail!("--batch must be at least 1");
    }

    ui::header("Emulated Sign");
    let emulation = setup(config, link);

    let gateway = Arc::new(MockGateway::new());
    let host_ledger = Arc::new(MockLedger::new());
    let mut host = emulation.host.clone().with_ledger(host_ledger.clone());
    if sponsored {
        host = host.with_gateway(gateway.clone());
    }

    let txs: Vec<Box<dyn TransactionBlock>> = (0..batch)
        .map(|i| {
            Box::new(MockTransaction::new(format!("transfer-{}", i).into_bytes()))
                as Box<dyn TransactionBlock>
        })
        .collect();
    let session = if batch == 1 {
        host.sign_session(txs.into_iter().next().ok_or_else(|| anyhow::anyhow!("no transaction"))?)?
    } else {
        host.sign_batch_session(txs)?
    };

    let qr = session.qr_payload();
    ui::step(
        Party::Host,
        &format!(
            "offering {} transaction(s){}",
            batch,
            if session.is_sponsored() { ", sponsored" } else { "" }
        ),
    );
    ui::pairing_code(&qr, verbose)?;

    if !yes && !ui::approve(&format!("sign {} transaction(s)?", batch))? {
        ui::warning("Signing declined");
        return Ok(());
    }

    let host_handle = session.spawn().await?;
    let initiator = emulation
        .initiator
        .clone()
        .with_ledger(Arc::new(MockLedger::new()));

    let spinner = ui::spinner(Party::Initiator, "signing...");
    let initiator_result = initiator.run_sign(&qr).await;
    spinner.finish_and_clear();
    let host_result = host_handle.wait().await;

    let outcomes = match (initiator_result, host_result) {
        (Ok(_), Ok(outcomes)) => outcomes,
        (Err(e), _) | (_, Err(e)) => {
            ui::error(&format!("Signing failed: {}", e));
            bail!(e);
        }
    };

    ui::separator();
    ui::success(&format!("{} transaction(s) finalized", outcomes.len()));
    print_outcomes(&outcomes, verbose);
    if sponsored {
        ui::key_value("Sponsored executions", &gateway.executed().len().to_string());
    } else {
        ui::key_value("Ledger executions", &host_ledger.executed().len().to_string());
    }
    report_link(&emulation.transport);
    Ok(())
}

fn print_outcomes(outcomes: &[SignOutcome], verbose: bool) {
    for outcome in outcomes {
        ui::key_value("Digest", &outcome.digest);
        if verbose {
            ui::json(&outcome.effects);
        }
    }
}
