mod common;

use anyhow::Result;
use common::{StandardAccounts, sent, test_store};
use txledger::application::LedgerError;
use txledger::domain::{
    AccountId, TransactionDraft, TransactionStatus, TransactionType, ValidationError,
};

#[tokio::test]
async fn test_create_scenario() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let record = store
        .create(sent(accounts.alice, accounts.bob, 5000, "tx001"))
        .await?;

    assert_eq!(record.amount_cents, 5000);
    assert_eq!(record.status, TransactionStatus::Pending);
    assert_eq!(record.transaction_id, "TX001");
    assert_eq!(record.fee_cents, 0);
    assert_eq!(record.transaction_type, TransactionType::Sent);
    assert_eq!(record.from, accounts.alice);
    assert_eq!(record.to, accounts.bob);
    assert_eq!(record.created_at, record.updated_at);
    assert_eq!(record.sequence, 1);

    let updated = store.update_status("tx001", TransactionStatus::Completed).await?;
    assert_eq!(updated.status, TransactionStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn test_created_record_matches_stored_record() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let created = store
        .create(
            sent(accounts.alice, accounts.bob, 1234, "abc-1")
                .with_note("lunch")
                .with_description("Lunch with Bob")
                .with_fee(25),
        )
        .await?;
    let stored = store.get_by_transaction_id("ABC-1").await?;

    assert_eq!(created, stored);
    assert_eq!(stored.note.as_deref(), Some("lunch"));
    assert_eq!(stored.fee_cents, 25);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_transaction_id_is_case_insensitive() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    store
        .create(sent(accounts.alice, accounts.bob, 100, "abc123"))
        .await?;
    let result = store
        .create(sent(accounts.bob, accounts.carol, 200, "ABC123"))
        .await;

    match result {
        Err(LedgerError::Validation(ValidationError::DuplicateTransactionId(id))) => {
            assert_eq!(id, "ABC123");
        }
        other => panic!("expected duplicate id error, got {:?}", other),
    }

    // The rejected entry was not written
    assert_eq!(store.list_all().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    for (i, amount) in [0, -1, -10000].into_iter().enumerate() {
        let err = store
            .create(sent(accounts.alice, accounts.bob, amount, &format!("neg{}", i)))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("amount"));
    }

    assert!(store.list_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_note_length_boundary() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    store
        .create(sent(accounts.alice, accounts.bob, 100, "n200").with_note("x".repeat(200)))
        .await?;

    let err = store
        .create(sent(accounts.alice, accounts.bob, 100, "n201").with_note("x".repeat(201)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::NoteTooLong(201))
    ));
    Ok(())
}

#[tokio::test]
async fn test_description_length_boundary() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    store
        .create(sent(accounts.alice, accounts.bob, 100, "d500").with_description("y".repeat(500)))
        .await?;

    let err = store
        .create(sent(accounts.alice, accounts.bob, 100, "d501").with_description("y".repeat(501)))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("description"));
    Ok(())
}

#[tokio::test]
async fn test_fee_rules() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let err = store
        .create(sent(accounts.alice, accounts.bob, 100, "fee-neg").with_fee(-1))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("fee"));

    let free = store
        .create(sent(accounts.alice, accounts.bob, 100, "fee-none"))
        .await?;
    assert_eq!(free.fee_cents, 0);

    let paid = store
        .create(sent(accounts.alice, accounts.bob, 100, "fee-some").with_fee(50))
        .await?;
    assert_eq!(paid.fee_cents, 50);
    Ok(())
}

#[tokio::test]
async fn test_invalid_type_and_missing_id() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let err = store
        .create(TransactionDraft::new(
            accounts.alice,
            accounts.bob,
            100,
            "refund",
            "t1",
        ))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("type"));

    let mut draft = sent(accounts.alice, accounts.bob, 100, "t2");
    draft.transaction_id = None;
    let err = store.create(draft).await.unwrap_err();
    assert_eq!(err.field(), Some("transactionId"));

    // "received" is accepted in any case
    let record = store
        .create(TransactionDraft::new(
            accounts.bob,
            accounts.alice,
            100,
            "Received",
            "t3",
        ))
        .await?;
    assert_eq!(record.transaction_type, TransactionType::Received);
    Ok(())
}

#[tokio::test]
async fn test_accounts_must_exist_and_differ() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;
    let stranger = AccountId::new();

    let err = store
        .create(sent(stranger, accounts.bob, 100, "u1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::UnknownAccount { field: "from", id }) if id == stranger
    ));

    let err = store
        .create(sent(accounts.alice, stranger, 100, "u2"))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("to"));

    let err = store
        .create(sent(accounts.alice, accounts.alice, 100, "u3"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::SameAccount)
    ));
    Ok(())
}

#[tokio::test]
async fn test_sequence_increases_without_gaps_after_rejections() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let first = store
        .create(sent(accounts.alice, accounts.bob, 100, "s1"))
        .await?;
    assert!(
        store
            .create(sent(accounts.alice, accounts.bob, 100, "S1"))
            .await
            .is_err()
    );
    let second = store
        .create(sent(accounts.alice, accounts.bob, 100, "s2"))
        .await?;

    assert_eq!(first.sequence, 1);
    assert_eq!(second.sequence, 2);
    Ok(())
}

#[tokio::test]
async fn test_update_description() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    let original = store
        .create(sent(accounts.alice, accounts.bob, 100, "desc1"))
        .await?;

    let updated = store
        .update_description("desc1", Some("Rent for March".into()))
        .await?;
    assert_eq!(updated.description.as_deref(), Some("Rent for March"));
    assert_eq!(updated.status, original.status);
    assert_eq!(updated.amount_cents, original.amount_cents);
    assert!(updated.updated_at >= original.updated_at);

    let err = store
        .update_description("desc1", Some("z".repeat(501)))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("description"));

    let err = store
        .update_description("missing", Some("x".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_register_account_rules() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let account = store.register_account("  Savings ").await?;
    assert_eq!(account.name, "Savings");
    assert_eq!(store.get_account("Savings").await?.id, account.id);
    assert_eq!(store.get_account_by_id(account.id).await?.name, "Savings");

    let err = store.register_account("Savings").await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountAlreadyExists(_)));

    let err = store.register_account("   ").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccountName(_)));

    assert_eq!(store.list_accounts().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_id_is_reported_before_fee() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    store
        .create(sent(accounts.alice, accounts.bob, 100, "abc123"))
        .await?;

    let err = store
        .create(sent(accounts.alice, accounts.bob, 100, "ABC123").with_fee(-1))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("transactionId"));

    // Also ahead of the account checks
    let err = store
        .create(sent(accounts.alice, accounts.alice, 100, "abc123"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::DuplicateTransactionId(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_creates_with_same_id() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let accounts = StandardAccounts::create(&store).await?;

    for round in 0..10 {
        let lower = format!("race{}", round);
        let upper = lower.to_uppercase();

        let (a, b) = tokio::join!(
            store.create(sent(accounts.alice, accounts.bob, 100, &lower)),
            store.create(sent(accounts.bob, accounts.carol, 200, &upper)),
        );

        let (winner, loser) = match (a, b) {
            (Ok(record), Err(err)) | (Err(err), Ok(record)) => (record, err),
            (a, b) => panic!("expected exactly one success, got {:?} and {:?}", a, b),
        };
        assert_eq!(winner.transaction_id, upper);
        assert!(
            matches!(
                loser,
                LedgerError::Validation(ValidationError::DuplicateTransactionId(_))
                    | LedgerError::Conflict(_)
            ),
            "unexpected error: {:?}",
            loser
        );
    }

    // Losers left no trace, not even in the sequence
    let all = store.list_all().await?;
    assert_eq!(all.len(), 10);
    let sequences: Vec<_> = all.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=10).collect::<Vec<i64>>());
    Ok(())
}
