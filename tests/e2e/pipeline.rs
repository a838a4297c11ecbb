//! Stake pipeline against the in-memory ledger.

#![allow(clippy::expect_used)]

use super::mocks::{labels, Behaviour, MockLedger};
use super::{TestHarness, MIN_STAKE, NEXT_AGENT_ID};
use solana_sdk::instruction::InstructionError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::TransactionError;
use stake_relay::credentials::RelayCredentials;
use stake_relay::error::{Error, RejectionKind};
use stake_relay::ledger::ConfigAccount;
use stake_relay::stake::ProxyStake;
use std::time::Duration;

const FIVE: u64 = 5_000_000;

fn stake(harness: &TestHarness, amount: u64) -> ProxyStake {
    ProxyStake {
        theme_id: 1,
        agent_id: 0,
        amount,
        beneficiary: harness.user,
    }
}

#[tokio::test]
async fn test_first_stake_on_existing_pair_creates_only_user_stake() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    let user_stake = harness.book.user_stake(1, 0, &harness.user).expect("derive").address;
    assert_eq!(
        user_stake.to_string(),
        "DfXkdHxd5ELe2tQvvR35ffwgsRmgHNfwv5KrCnfcxr58"
    );

    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    assert_eq!(submitted.instructions, vec!["init_user_stake", "proxy_stake"]);
    assert_eq!(submitted.attempts, 1);
    let sent = harness.ledger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(labels(&sent[0]), vec!["init_user_stake", "proxy_stake"]);
    assert_eq!(sent[0].signatures[0], submitted.signature);
    assert!(harness.ledger.has_account(&user_stake));
}

#[tokio::test]
async fn test_fresh_pair_initializes_in_dependency_order() {
    let harness = TestHarness::setup();
    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    assert_eq!(
        submitted.instructions,
        vec![
            "init_theme_agent",
            "init_agent_vault_authority",
            "init_agent_vault",
            "init_user_stake",
            "proxy_stake",
        ]
    );
    assert_eq!(labels(&harness.ledger.sent()[0]), submitted.instructions);

    // The relay is the only signer and pays the fee.
    let tx = &harness.ledger.sent()[0];
    assert_eq!(tx.message.header().num_required_signatures, 1);
    assert_eq!(
        tx.message.static_account_keys()[0],
        harness.credentials.relay_pubkey()
    );
    assert!(tx.verify_with_results().iter().all(|ok| *ok));
}

#[tokio::test]
async fn test_repeat_stake_never_reinitializes() {
    let harness = TestHarness::setup();
    for round in 0..2 {
        let payment = harness.pay(FIVE).await;
        let submitted = harness
            .relay
            .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
            .await
            .expect("stake");
        if round == 1 {
            assert_eq!(submitted.instructions, vec!["proxy_stake"]);
        }
    }
    assert_eq!(harness.ledger.sent().len(), 2);
}

#[tokio::test]
async fn test_expired_checkpoint_rejection_rebuilds_with_fresh_blockhash() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([Behaviour::ExpireCheckpoint]);

    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    assert_eq!(submitted.attempts, 2);
    let sent = harness.ledger.sent();
    assert_eq!(sent.len(), 2);
    assert_ne!(
        sent[0].message.recent_blockhash(),
        sent[1].message.recent_blockhash()
    );
    assert_ne!(sent[0].signatures[0], sent[1].signatures[0]);
}

#[tokio::test]
async fn test_rejections_exhaust_attempts() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([
        Behaviour::ExpireCheckpoint,
        Behaviour::ExpireCheckpoint,
        Behaviour::ExpireCheckpoint,
    ]);

    let payment = harness.pay(FIVE).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("attempts exhausted");

    assert!(matches!(
        err,
        Error::SubmissionRejected {
            kind: RejectionKind::CheckpointExpired,
            ..
        }
    ));
    assert_eq!(harness.ledger.sent().len(), 3);
}

#[tokio::test]
async fn test_concurrent_init_rejected_at_submission_is_reprobed() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    let user_stake = harness.book.user_stake(1, 0, &harness.user).expect("derive").address;
    harness.ledger.script([Behaviour::RaceCreate(user_stake)]);

    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    assert_eq!(submitted.attempts, 2);
    assert_eq!(submitted.instructions, vec!["proxy_stake"]);
    let sent = harness.ledger.sent();
    assert_eq!(labels(&sent[0]), vec!["init_user_stake", "proxy_stake"]);
    assert_eq!(labels(&sent[1]), vec!["proxy_stake"]);
}

#[tokio::test]
async fn test_concurrent_init_landing_as_failure_is_reprobed() {
    let harness = TestHarness::with_ledger(MockLedger::without_preflight());
    let theme_agent = harness.book.theme_agent(1, 0).expect("derive").address;
    harness.ledger.script([Behaviour::RaceCreate(theme_agent)]);

    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    // The losing transaction rolled back, so the rebuilt one still creates
    // everything except the account the other request made.
    assert_eq!(submitted.attempts, 2);
    assert_eq!(
        submitted.instructions,
        vec![
            "init_agent_vault_authority",
            "init_agent_vault",
            "init_user_stake",
            "proxy_stake",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_init_seen_after_expiry_is_reprobed() {
    let harness = TestHarness::with_ledger(MockLedger::without_preflight());
    let theme_agent = harness.book.theme_agent(1, 0).expect("derive").address;
    harness.ledger.script([Behaviour::RaceCreateSeenLate(theme_agent)]);

    let payment = harness.pay(FIVE).await;
    let submitted = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake");

    assert_eq!(submitted.attempts, 2);
    assert_eq!(
        submitted.instructions,
        vec![
            "init_agent_vault_authority",
            "init_agent_vault",
            "init_user_stake",
            "proxy_stake",
        ]
    );
    assert_eq!(harness.ledger.sent().len(), 2);
}

#[tokio::test]
async fn test_simultaneous_stakes_on_a_fresh_pair_both_land() {
    let harness = TestHarness::setup();
    let other = Pubkey::new_unique();
    let first = stake(&harness, FIVE);
    let second = ProxyStake {
        beneficiary: other,
        ..stake(&harness, FIVE)
    };
    let first_payment = harness.pay(FIVE).await;
    let second_payment = harness.pay(FIVE).await;

    let (a, b) = tokio::join!(
        harness.relay.proxy_stake(&harness.credentials, &first, &first_payment),
        harness.relay.proxy_stake(&harness.credentials, &second, &second_payment),
    );
    let a = a.expect("first stake");
    let b = b.expect("second stake");

    // Both built the full pair setup; the loser re-probed and skipped it.
    assert_eq!(a.attempts + b.attempts, 3);
    assert_eq!(harness.ledger.sent().len(), 3);
    for address in [
        harness.book.theme_agent(1, 0),
        harness.book.agent_vault(1, 0),
        harness.book.user_stake(1, 0, &harness.user),
        harness.book.user_stake(1, 0, &other),
    ] {
        assert!(harness.ledger.has_account(&address.expect("derive").address));
    }
}

#[tokio::test]
async fn test_code_zero_on_the_stake_itself_is_not_a_race() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([Behaviour::Fail(TransactionError::InstructionError(
        1,
        InstructionError::Custom(0),
    ))]);

    let payment = harness.pay(FIVE).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("stake failed");

    assert!(matches!(err, Error::TransactionFailed { .. }));
    assert_eq!(harness.ledger.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_transaction_is_indeterminate_and_not_resent() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([Behaviour::NeverLand]);

    let payment = harness.pay(FIVE).await;
    let started = tokio::time::Instant::now();
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("never lands");

    let sent = harness.ledger.sent();
    match &err {
        Error::ConfirmationExpired { signature, .. } => {
            assert_eq!(*signature, sent[0].signatures[0]);
        }
        other => panic!("expected ConfirmationExpired, got {other:?}"),
    }
    assert!(err.is_indeterminate());
    assert_eq!(sent.len(), 1);
    // Polled once per block until the horizon passed.
    assert!(started.elapsed() >= Duration::from_millis(5));
}

#[tokio::test]
async fn test_program_error_fails_without_retry() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([Behaviour::Fail(TransactionError::InstructionError(
        1,
        InstructionError::Custom(6003),
    ))]);

    let payment = harness.pay(FIVE).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("program error");

    assert!(matches!(err, Error::TransactionFailed { .. }));
    assert_eq!(harness.ledger.sent().len(), 1);
}

#[tokio::test]
async fn test_unclassified_rejection_is_fatal() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness
        .ledger
        .script([Behaviour::Refuse("insufficient funds for fee".into())]);

    let payment = harness.pay(FIVE).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("refused");

    assert!(matches!(
        err,
        Error::SubmissionRejected {
            kind: RejectionKind::Other,
            ..
        }
    ));
    assert_eq!(harness.ledger.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_checkpoint_failures_are_retried() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.fail_checkpoints(2);

    let payment = harness.pay(FIVE).await;
    let started = tokio::time::Instant::now();
    harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect("stake after retries");
    assert_eq!(harness.ledger.sent().len(), 1);
    // Backoff of 1ms, then 2ms.
    assert!(started.elapsed() >= Duration::from_millis(3));
}

#[tokio::test(start_paused = true)]
async fn test_persistent_checkpoint_failure_sends_nothing() {
    let harness = TestHarness::setup();
    harness.ledger.fail_checkpoints(10);

    let payment = harness.pay(FIVE).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("no checkpoint");
    assert!(matches!(err, Error::Rpc(_)));
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_payment_must_cover_the_stake() {
    let harness = TestHarness::setup();
    let payment = harness.pay(2_000_000).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &stake(&harness, FIVE), &payment)
        .await
        .expect_err("underpaid");
    assert!(matches!(err, Error::Validation(_)));
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_below_minimum_is_refused_before_signing() {
    let harness = TestHarness::setup();
    let request = stake(&harness, MIN_STAKE - 1);

    let err = harness.relay.preflight(&request).await.expect_err("below min");
    assert!(matches!(
        err,
        Error::BelowMinimumStake {
            amount,
            minimum: MIN_STAKE
        } if amount == MIN_STAKE - 1
    ));

    let payment = harness.pay(MIN_STAKE - 1).await;
    let err = harness
        .relay
        .proxy_stake(&harness.credentials, &request, &payment)
        .await
        .expect_err("below min");
    assert!(matches!(err, Error::BelowMinimumStake { .. }));
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_paused_deployment_refuses_stakes() {
    let harness = TestHarness::setup();
    let admin = harness.credentials.admin().expect("admin").pubkey();
    let paused = ConfigAccount {
        admin,
        stake_mint: harness.mint,
        min_stake_amount: MIN_STAKE,
        paused: true,
        next_agent_id: NEXT_AGENT_ID,
    };
    harness
        .ledger
        .put_account(harness.book.config().expect("config").address, paused.encode(1));

    let err = harness
        .relay
        .preflight(&stake(&harness, FIVE))
        .await
        .expect_err("paused");
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_register_agent_is_cosigned_by_new_identity() {
    let harness = TestHarness::setup();
    let registration = harness
        .relay
        .register_agent(&harness.credentials)
        .await
        .expect("register");

    assert_eq!(registration.agent_id, NEXT_AGENT_ID);
    assert_eq!(
        registration.agent,
        harness.book.agent(NEXT_AGENT_ID).expect("derive").address
    );
    assert!(harness.ledger.has_account(&registration.agent));
    assert!(harness.ledger.has_account(&registration.agent_perf));

    let sent = harness.ledger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(labels(&sent[0]), vec!["init_agent_perf", "register_agent"]);
    assert_eq!(sent[0].message.header().num_required_signatures, 2);
    let keys = sent[0].message.static_account_keys();
    assert_eq!(keys[0], harness.credentials.admin().expect("admin").pubkey());
    assert_eq!(keys[1], registration.identity().pubkey());
    assert!(sent[0].verify_with_results().iter().all(|ok| *ok));
}

#[tokio::test]
async fn test_register_agent_moves_past_an_id_claimed_concurrently() {
    let harness = TestHarness::setup();
    let admin = harness.credentials.admin().expect("admin").pubkey();
    let claimed = ConfigAccount {
        admin,
        stake_mint: harness.mint,
        min_stake_amount: MIN_STAKE,
        paused: false,
        next_agent_id: NEXT_AGENT_ID + 1,
    };
    let book = harness.book;
    harness.ledger.script([Behaviour::RaceWrite(vec![
        (book.config().expect("config").address, claimed.encode(1)),
        (book.agent(NEXT_AGENT_ID).expect("agent").address, vec![1; 8]),
        (book.agent_perf(NEXT_AGENT_ID).expect("perf").address, vec![1; 8]),
    ])]);

    let registration = harness
        .relay
        .register_agent(&harness.credentials)
        .await
        .expect("register");

    assert_eq!(registration.agent_id, NEXT_AGENT_ID + 1);
    assert!(harness.ledger.has_account(&registration.agent));
    let sent = harness.ledger.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(labels(&sent[1]), vec!["init_agent_perf", "register_agent"]);
    assert_eq!(
        sent[1].message.static_account_keys()[1],
        registration.identity().pubkey()
    );
}

#[tokio::test]
async fn test_register_agent_requires_deployment_admin() {
    let harness = TestHarness::setup();
    let impostor = RelayCredentials::new(Keypair::new(), Some(Keypair::new()));
    let err = harness
        .relay
        .register_agent(&impostor)
        .await
        .expect_err("not admin");
    assert!(matches!(err, Error::Config(_)));

    let no_admin = RelayCredentials::new(Keypair::new(), None);
    let err = harness
        .relay
        .register_agent(&no_admin)
        .await
        .expect_err("no admin");
    assert!(matches!(err, Error::Credentials(_)));
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_config_account_is_a_layout_error() {
    let harness = TestHarness::with_ledger(MockLedger::new());
    harness
        .ledger
        .put_account(harness.book.config().expect("config").address, vec![0; 4]);
    let err = harness.relay.load_config().await.expect_err("short");
    assert!(matches!(err, Error::Layout(_)));
}
