
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use mock_implementations::{is_closed, link_pair};
use pairkit_interactive::message::{Payload, SignedTransaction, UnsignedTransaction};
use pairkit_interactive::sign::{initiate_sign, SignResponder};
use pairkit_interactive::{Message, PairkitError, STEP_0, STEP_1, STEP_2};
use pairkit_lib::crypto::transaction_digest;
use pairkit_lib::test_utils::{MockGateway, MockLedger, MockTransaction, TestSigner};
use pairkit_lib::{Network, Signer, TransactionBlock};

fn boxed(txs: &[MockTransaction]) -> Vec<Box<dyn TransactionBlock>> {
    txs.iter()
        .cloned()
        .map(|tx| Box::new(tx) as Box<dyn TransactionBlock>)
        .collect()
}

#[tokio::test]
async fn test_sponsored_sign_scenario() {
    let (mut initiator_link, mut host_link, initiator_closed, host_closed) = link_pair();
    let signer = TestSigner::from_seed([21u8; 32]);
    let gateway = Arc::new(MockGateway::new());
    let host_ledger = Arc::new(MockLedger::new());
    let initiator_ledger = MockLedger::new();

    let tx = MockTransaction::new(b"move-call".to_vec());
    let responder =
        SignResponder::new(Network::Testnet, host_ledger.clone()).sponsored(gateway.clone());
    let host = {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut txs = boxed(&[tx]);
            responder.respond(&mut host_link, &mut txs, false).await
        })
    };

    let initiator_outcomes = initiate_sign(&mut initiator_link, &signer, &initiator_ledger)
        .await
        .unwrap();
    let host_outcomes = host.await.unwrap().unwrap();

    // Sender unset, so the gateway sponsors the Initiator's address
    let created = gateway.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, signer.address());
    assert_eq!(created[0].1, Network::Testnet);
    assert_eq!(created[0].2, tx.expected_kind_bytes());
    assert_eq!(tx.builds(), vec![true]);

    let sponsored = MockGateway::sponsored_bytes(&signer.address(), &tx.expected_kind_bytes());
    let d1 = transaction_digest(&sponsored);

    let host_outcome = &host_outcomes[0];
    assert_eq!(host_outcome.bytes, BASE64.encode(&sponsored));
    assert_eq!(host_outcome.digest, d1);
    assert_eq!(host_outcome.signature, signer.sign_transaction(&sponsored).await.unwrap());
    assert_eq!(gateway.executed(), vec![(d1.clone(), host_outcome.signature.clone())]);
    assert_eq!(host_ledger.waited(), vec![d1.clone()]);
    assert!(host_ledger.executed().is_empty());

    // The Initiator awaited the same digest on its own
    assert_eq!(initiator_outcomes, host_outcomes);
    assert_eq!(initiator_ledger.waited(), vec![d1]);

    assert!(is_closed(&initiator_closed));
    assert!(is_closed(&host_closed));
}

#[tokio::test]
async fn test_unsponsored_sign_executes_through_ledger() {
    let (mut initiator_link, mut host_link, _, _) = link_pair();
    let signer = TestSigner::from_seed([22u8; 32]);
    let host_ledger = Arc::new(MockLedger::new());
    let initiator_ledger = MockLedger::new();

    let tx = MockTransaction::new(b"transfer".to_vec());
    let responder = SignResponder::new(Network::Devnet, host_ledger.clone());
    let host = {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut txs = boxed(&[tx]);
            responder.respond(&mut host_link, &mut txs, false).await
        })
    };

    let initiator_outcomes = initiate_sign(&mut initiator_link, &signer, &initiator_ledger)
        .await
        .unwrap();
    let host_outcomes = host.await.unwrap().unwrap();

    let full = tx.expected_full_bytes(&signer.address());
    let executed = host_ledger.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].0, full);
    assert_eq!(tx.builds(), vec![false]);

    // Without a sponsor digest the Initiator derives the same one locally
    assert_eq!(host_outcomes[0].digest, transaction_digest(&full));
    assert_eq!(initiator_outcomes[0].digest, host_outcomes[0].digest);
    assert_eq!(initiator_outcomes[0].signature, executed[0].1);
}

#[tokio::test]
async fn test_preset_sender_is_kept() {
    let (mut initiator_link, mut host_link, _, _) = link_pair();
    let signer = TestSigner::from_seed([23u8; 32]);
    let host_ledger = Arc::new(MockLedger::new());

    let tx = MockTransaction::new(b"transfer".to_vec()).with_sender("0xpreset");
    let responder = SignResponder::new(Network::Testnet, host_ledger.clone());
    let host = {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut txs = boxed(&[tx]);
            responder.respond(&mut host_link, &mut txs, false).await
        })
    };

    initiate_sign(&mut initiator_link, &signer, &MockLedger::new())
        .await
        .unwrap();
    host.await.unwrap().unwrap();

    assert_eq!(host_ledger.executed()[0].0, tx.expected_full_bytes("0xpreset"));
}

async fn run_batch(n: usize, sponsored: bool) {
    let (mut initiator_link, mut host_link, _, _) = link_pair();
    let signer = TestSigner::random();
    let host_ledger = Arc::new(MockLedger::new());
    let gateway = Arc::new(MockGateway::new());

    let txs: Vec<MockTransaction> = (0..n)
        .map(|i| MockTransaction::new(format!("tx-{}", i).into_bytes()))
        .collect();
    let mut responder = SignResponder::new(Network::Testnet, host_ledger.clone());
    if sponsored {
        responder = responder.sponsored(gateway.clone());
    }
    let host = {
        let txs = txs.clone();
        tokio::spawn(async move {
            let mut txs = boxed(&txs);
            responder.respond(&mut host_link, &mut txs, true).await
        })
    };

    let initiator_outcomes = initiate_sign(&mut initiator_link, &signer, &MockLedger::new())
        .await
        .unwrap();
    let host_outcomes = host.await.unwrap().unwrap();

    assert_eq!(host_outcomes.len(), n);
    assert_eq!(initiator_outcomes.len(), n);

    for (i, (tx, outcome)) in txs.iter().zip(&host_outcomes).enumerate() {
        let expected = if sponsored {
            MockGateway::sponsored_bytes(&signer.address(), &tx.expected_kind_bytes())
        } else {
            tx.expected_full_bytes(&signer.address())
        };
        // Bytes come back exactly as offered, in order, with a signature added
        assert_eq!(BASE64.decode(&outcome.bytes).unwrap(), expected, "tx {}", i);
        assert_eq!(outcome.digest, transaction_digest(&expected));
        assert_eq!(outcome.signature, signer.sign_transaction(&expected).await.unwrap());
        assert_eq!(initiator_outcomes[i].digest, outcome.digest);
    }

    let mut digests: Vec<_> = host_outcomes.iter().map(|o| o.digest.clone()).collect();
    digests.dedup();
    assert_eq!(digests.len(), n);
}

#[tokio::test]
async fn test_batch_conservation_unsponsored() {
    for n in [1, 2, 5] {
        run_batch(n, false).await;
    }
}

#[tokio::test]
async fn test_batch_conservation_sponsored() {
    for n in [1, 3] {
        run_batch(n, true).await;
    }
}

#[tokio::test]
async fn test_batch_payload_uses_txs_array() {
    let (mut peer, mut host_link, _, _) = link_pair();
    let responder = SignResponder::new(Network::Testnet, Arc::new(MockLedger::new()));
    let txs = vec![
        MockTransaction::new(b"a".to_vec()),
        MockTransaction::new(b"b".to_vec()),
    ];

    let host = tokio::spawn(async move {
        let mut txs = boxed(&txs);
        responder.respond(&mut host_link, &mut txs, true).await
    });

    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    let step1 = peer.expect_message().await.unwrap();
    assert!(step1.is(STEP_1));
    let json: serde_json::Value = serde_json::from_str(&step1.value).unwrap();
    assert_eq!(json["txs"].as_array().unwrap().len(), 2);

    // Signing only one of two is a protocol violation
    let offered: Payload<UnsignedTransaction> = step1.payload().unwrap();
    let first = offered.into_items().remove(0);
    let short = Payload::Batch {
        txs: vec![SignedTransaction {
            bytes: first.bytes,
            signature: "AA==".into(),
            digest: None,
        }],
    };
    peer.send(&Message::with_payload(STEP_2, &short).unwrap())
        .await
        .unwrap();

    let err = host.await.unwrap().unwrap_err();
    assert!(matches!(err, PairkitError::Protocol(_)));
}

#[tokio::test]
async fn test_step2_before_step0_is_rejected() {
    let (mut peer, mut host_link, _, host_closed) = link_pair();
    let ledger = Arc::new(MockLedger::new());
    let responder = SignResponder::new(Network::Testnet, ledger.clone());
    let tx = MockTransaction::new(b"a".to_vec());

    peer.send(&Message::new(STEP_2, "{}")).await.unwrap();
    let mut txs = boxed(&[tx.clone()]);
    let err = responder
        .respond(&mut host_link, &mut txs, false)
        .await
        .unwrap_err();

    assert_eq!(err, PairkitError::unknown_message_type(STEP_2));
    assert!(is_closed(&host_closed));
    assert!(tx.builds().is_empty());
    assert!(ledger.executed().is_empty());
}

#[tokio::test]
async fn test_repeated_step0_is_rejected() {
    let (mut peer, mut host_link, _, _) = link_pair();
    let responder = SignResponder::new(Network::Testnet, Arc::new(MockLedger::new()));

    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    let mut txs = boxed(&[MockTransaction::new(b"a".to_vec())]);
    let err = responder
        .respond(&mut host_link, &mut txs, false)
        .await
        .unwrap_err();

    assert_eq!(err, PairkitError::unknown_message_type(STEP_0));
}

#[tokio::test]
async fn test_gateway_failure_closes_link() {
    let (mut initiator_link, mut host_link, _, _) = link_pair();
    let signer = TestSigner::from_seed([24u8; 32]);
    let responder = SignResponder::new(Network::Testnet, Arc::new(MockLedger::new()))
        .sponsored(Arc::new(MockGateway::failing_create()));

    let host = tokio::spawn(async move {
        let mut txs = boxed(&[MockTransaction::new(b"a".to_vec())]);
        responder.respond(&mut host_link, &mut txs, false).await
    });

    let initiator_err = initiate_sign(&mut initiator_link, &signer, &MockLedger::new())
        .await
        .unwrap_err();
    let host_err = host.await.unwrap().unwrap_err();

    assert!(matches!(host_err, PairkitError::Gateway(_)));
    assert_eq!(initiator_err, PairkitError::ClosedByPeer);
}

#[tokio::test]
async fn test_ledger_rejection_surfaces_on_host() {
    let (mut initiator_link, mut host_link, _, _) = link_pair();
    let signer = TestSigner::from_seed([25u8; 32]);
    let responder = SignResponder::new(Network::Testnet, Arc::new(MockLedger::failing()));

    let host = tokio::spawn(async move {
        let mut txs = boxed(&[MockTransaction::new(b"a".to_vec())]);
        responder.respond(&mut host_link, &mut txs, false).await
    });

    // The Initiator only waits for finalization, which its own ledger reports
    initiate_sign(&mut initiator_link, &signer, &MockLedger::new())
        .await
        .unwrap();
    let err = host.await.unwrap().unwrap_err();
    assert!(matches!(err, PairkitError::Ledger(_)));
}

#[tokio::test]
async fn test_initiator_rejects_unknown_reply() {
    let (mut initiator_link, mut peer, initiator_closed, _) = link_pair();

    let fake_host = tokio::spawn(async move {
        let step0 = peer.expect_message().await.unwrap();
        assert!(step0.is(STEP_0));
        peer.send(&Message::new("STEP_X", "")).await.unwrap();
    });

    let err = initiate_sign(
        &mut initiator_link,
        &TestSigner::from_seed([26u8; 32]),
        &MockLedger::new(),
    )
    .await
    .unwrap_err();
    fake_host.await.unwrap();

    assert_eq!(err, PairkitError::unknown_message_type("STEP_X"));
    assert!(is_closed(&initiator_closed));
}

#[tokio::test]
async fn test_substituted_bytes_are_not_executed() {
    let (mut peer, mut host_link, _, host_closed) = link_pair();
    let ledger = Arc::new(MockLedger::new());
    let responder = SignResponder::new(Network::Testnet, ledger.clone());

    let host = tokio::spawn(async move {
        let mut txs = boxed(&[MockTransaction::new(b"pay-1".to_vec())]);
        responder.respond(&mut host_link, &mut txs, false).await
    });

    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    let step1 = peer.expect_message().await.unwrap();
    let offered: UnsignedTransaction = step1.payload().unwrap();
    assert_eq!(BASE64.decode(&offered.bytes).unwrap(), b"tx:0xaa:pay-1".to_vec());

    let swapped = SignedTransaction {
        bytes: BASE64.encode(b"drain-everything"),
        signature: "AA==".into(),
        digest: None,
    };
    peer.send(&Message::with_payload(STEP_2, &swapped).unwrap())
        .await
        .unwrap();

    let err = host.await.unwrap().unwrap_err();
    assert!(matches!(err, PairkitError::Protocol(_)));
    assert!(ledger.executed().is_empty());
    assert!(ledger.waited().is_empty());
    assert!(is_closed(&host_closed));
}

#[tokio::test]
async fn test_substituted_sponsor_digest_is_not_executed() {
    let (mut peer, mut host_link, _, _) = link_pair();
    let gateway = Arc::new(MockGateway::new());
    let ledger = Arc::new(MockLedger::new());
    let responder =
        SignResponder::new(Network::Testnet, ledger.clone()).sponsored(gateway.clone());

    let host = tokio::spawn(async move {
        let mut txs = boxed(&[MockTransaction::new(b"pay-1".to_vec())]);
        responder.respond(&mut host_link, &mut txs, false).await
    });

    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    let offered: UnsignedTransaction = peer.expect_message().await.unwrap().payload().unwrap();
    assert!(offered.digest.is_some());

    let forged = SignedTransaction {
        bytes: offered.bytes,
        signature: "AA==".into(),
        digest: Some("someone-elses-digest".into()),
    };
    peer.send(&Message::with_payload(STEP_2, &forged).unwrap())
        .await
        .unwrap();

    let err = host.await.unwrap().unwrap_err();
    assert!(matches!(err, PairkitError::Protocol(_)));
    assert!(gateway.executed().is_empty());
    assert!(ledger.waited().is_empty());
}

#[tokio::test]
async fn test_omitted_digest_executes_offered_digest() {
    let (mut peer, mut host_link, _, _) = link_pair();
    let gateway = Arc::new(MockGateway::new());
    let responder = SignResponder::new(Network::Testnet, Arc::new(MockLedger::new()))
        .sponsored(gateway.clone());

    let host = tokio::spawn(async move {
        let mut txs = boxed(&[MockTransaction::new(b"pay-1".to_vec())]);
        responder.respond(&mut host_link, &mut txs, false).await
    });

    peer.send(&Message::new(STEP_0, "0xaa")).await.unwrap();
    let offered: UnsignedTransaction = peer.expect_message().await.unwrap().payload().unwrap();
    let reply = SignedTransaction {
        bytes: offered.bytes.clone(),
        signature: "AA==".into(),
        digest: None,
    };
    peer.send(&Message::with_payload(STEP_2, &reply).unwrap())
        .await
        .unwrap();

    let outcomes = host.await.unwrap().unwrap();
    let offered_digest = offered.digest.unwrap();
    assert_eq!(outcomes[0].digest, offered_digest);
    assert_eq!(outcomes[0].bytes, offered.bytes);
    assert_eq!(gateway.executed(), vec![(offered_digest, "AA==".to_string())]);
}
