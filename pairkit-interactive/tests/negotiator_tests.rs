use std::sync::Arc;
use std::time::Duration;

use pairkit_interactive::{
    Fault, Message, MemoryTransport, Negotiator, PairkitError, Phase, Transport, TransportEvent,
    TransportMode, STEP_0,
};
use pairkit_lib::IceConfig;
use tokio::time::Instant;

const ADDRESS: &str = "sui..testnet..abc123..login";
const OPEN_TIMEOUT: Duration = Duration::from_secs(8);

fn negotiator(transport: &MemoryTransport) -> Negotiator {
    Negotiator::new(Arc::new(transport.clone()), OPEN_TIMEOUT)
}

#[tokio::test]
async fn test_direct_link_wins_without_fallback() {
    let transport = MemoryTransport::new();
    let ice = IceConfig::default();
    let _host = transport.listen(ADDRESS, &ice).await.unwrap();

    let established = negotiator(&transport).dial(ADDRESS, &ice).await.unwrap();

    assert_eq!(established.phase(), Some(Phase::Direct));
    assert_eq!(transport.dial_modes(), vec![TransportMode::Default]);
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout_starts_relay_exactly_once() {
    let transport = MemoryTransport::new();
    transport.set_fault(TransportMode::Default, Fault::Block);
    let ice = IceConfig::default();
    let _host = transport.listen(ADDRESS, &ice).await.unwrap();

    let started = Instant::now();
    let established = negotiator(&transport).dial(ADDRESS, &ice).await.unwrap();

    assert_eq!(established.phase(), Some(Phase::Relay));
    assert!(started.elapsed() >= OPEN_TIMEOUT);
    assert_eq!(
        transport.dial_modes(),
        vec![TransportMode::Default, TransportMode::RelayOnly]
    );
}

#[tokio::test(start_paused = true)]
async fn test_direct_error_falls_back_without_waiting() {
    let transport = MemoryTransport::new();
    transport.set_fault(TransportMode::Default, Fault::Fail("ice failed".into()));
    let ice = IceConfig::default();
    let _host = transport.listen(ADDRESS, &ice).await.unwrap();

    let started = Instant::now();
    let established = negotiator(&transport).dial(ADDRESS, &ice).await.unwrap();

    assert_eq!(established.phase(), Some(Phase::Relay));
    assert!(started.elapsed() < OPEN_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_both_phases_timing_out_is_connectivity_error() {
    let transport = MemoryTransport::new();
    transport.set_fault(TransportMode::Default, Fault::Block);
    transport.set_fault(TransportMode::RelayOnly, Fault::Block);
    let ice = IceConfig::default();
    let _host = transport.listen(ADDRESS, &ice).await.unwrap();

    let started = Instant::now();
    let err = negotiator(&transport)
        .dial(ADDRESS, &ice)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, PairkitError::Connectivity(_)));
    assert!(!err.is_retryable());
    assert!(started.elapsed() >= OPEN_TIMEOUT * 2);
    // No third attempt after the relay phase gave up
    tokio::time::sleep(OPEN_TIMEOUT * 3).await;
    assert_eq!(transport.dial_modes().len(), 2);
}

#[tokio::test]
async fn test_relay_error_surfaces_once() {
    let transport = MemoryTransport::new();
    transport.set_fault(TransportMode::Default, Fault::Fail("direct refused".into()));
    transport.set_fault(TransportMode::RelayOnly, Fault::Fail("relay refused".into()));
    let ice = IceConfig::default();

    let err = negotiator(&transport)
        .dial(ADDRESS, &ice)
        .await
        .err()
        .unwrap();

    assert_eq!(err, PairkitError::Connectivity("relay refused".into()));
    assert_eq!(transport.dial_modes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_late_direct_link_is_closed() {
    let transport = MemoryTransport::new();
    // Direct opens at 9s, after the 8s timeout already started the relay
    transport.set_fault(TransportMode::Default, Fault::Delay(Duration::from_secs(9)));
    transport.set_fault(TransportMode::RelayOnly, Fault::Delay(Duration::from_millis(500)));
    let ice = IceConfig::default();
    let mut host = transport.listen(ADDRESS, &ice).await.unwrap();

    let mut established = negotiator(&transport).dial(ADDRESS, &ice).await.unwrap();
    assert_eq!(established.phase(), Some(Phase::Relay));

    let Some(TransportEvent::Open(mut winner)) = host.events.recv().await else {
        panic!("relay link did not reach the host");
    };
    let Some(TransportEvent::Open(mut late)) = host.events.recv().await else {
        panic!("late direct link did not reach the host");
    };

    // The Initiator closed its end of the late link without using it
    assert_eq!(late.recv().await.unwrap(), None);
    assert_eq!(transport.links_opened(), 2);

    // The winning link still carries traffic
    established
        .link
        .send(&Message::new(STEP_0, "0xaa"))
        .await
        .unwrap();
    let frame = winner.recv().await.unwrap().unwrap();
    assert_eq!(Message::parse(&frame).unwrap().value, "0xaa");
}

#[tokio::test(start_paused = true)]
async fn test_retired_direct_attempt_cannot_win() {
    let transport = MemoryTransport::new();
    // Direct opens at 9s, but the fallback retired it at 8s; relay never opens
    transport.set_fault(TransportMode::Default, Fault::Delay(Duration::from_secs(9)));
    transport.set_fault(TransportMode::RelayOnly, Fault::Block);
    let ice = IceConfig::default();
    let mut host = transport.listen(ADDRESS, &ice).await.unwrap();

    let started = Instant::now();
    let err = negotiator(&transport)
        .dial(ADDRESS, &ice)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, PairkitError::Connectivity(_)));
    assert!(started.elapsed() >= OPEN_TIMEOUT * 2);

    let Some(TransportEvent::Open(mut late)) = host.events.recv().await else {
        panic!("late direct link did not reach the host");
    };
    assert_eq!(late.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_listener_closes_extra_inbound_links() {
    let transport = MemoryTransport::new();
    let ice = IceConfig::default();
    let pending = negotiator(&transport).listen(ADDRESS, &ice).await.unwrap();

    let mut first = transport
        .dial(ADDRESS, &ice, TransportMode::Default)
        .await
        .unwrap();
    let mut second = transport
        .dial(ADDRESS, &ice, TransportMode::Default)
        .await
        .unwrap();

    let mut established = pending.accept().await.unwrap();
    assert_eq!(established.phase(), None);

    let Some(TransportEvent::Open(mut first_channel)) = first.events.recv().await else {
        panic!("first dial did not open");
    };
    let Some(TransportEvent::Open(mut second_channel)) = second.events.recv().await else {
        panic!("second dial did not open");
    };

    assert_eq!(second_channel.recv().await.unwrap(), None);

    first_channel
        .send(Message::new(STEP_0, "0xbb").to_frame().unwrap())
        .await
        .unwrap();
    assert_eq!(established.link.expect_message().await.unwrap().value, "0xbb");
}

#[tokio::test]
async fn test_listener_error_is_connectivity_error() {
    let transport = MemoryTransport::new();
    let ice = IceConfig::default();
    let pending = negotiator(&transport).listen(ADDRESS, &ice).await.unwrap();

    assert!(transport.break_listener(ADDRESS, "relay allocation failed"));
    let err = pending.accept().await.err().unwrap();
    assert_eq!(
        err,
        PairkitError::Connectivity("relay allocation failed".into())
    );
    assert!(!transport.is_listening(ADDRESS));
}

#[tokio::test]
async fn test_finishing_a_link_destroys_the_listener() {
    let transport = MemoryTransport::new();
    let ice = IceConfig::default();
    let negotiator = negotiator(&transport);

    let pending = negotiator.listen(ADDRESS, &ice).await.unwrap();
    let _initiator = negotiator.dial(ADDRESS, &ice).await.unwrap();
    let established = pending.accept().await.unwrap();
    assert!(transport.is_listening(ADDRESS));

    established.finish().await;
    assert!(!transport.is_listening(ADDRESS));
}
