//! End-to-end ledger behaviour against both storage backends.

use std::sync::Arc;
use std::time::Duration;

use artesia_core::{
    Account, AccountId, Conversion, ConversionStatus, ImageFormat, StyleCatalog, StyleId,
    TransactionKind,
};
use artesia_ledger::{ConversionError, Ledger, LedgerOptions};
use artesia_store::{MemoryStore, RocksStore, Store, StoreError};
use artesia_transform::{Script, ScriptedTransformer};

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

struct Fixture {
    ledger: Ledger,
    store: Arc<dyn Store>,
    transformer: Arc<ScriptedTransformer>,
    account_id: AccountId,
}

impl Fixture {
    fn new(balance: i64, transformer: ScriptedTransformer) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), balance, transformer)
    }

    fn with_store(store: Arc<dyn Store>, balance: i64, transformer: ScriptedTransformer) -> Self {
        let account_id = AccountId::generate();
        store
            .create_account(&Account::with_trial(account_id, balance))
            .unwrap();

        let transformer = Arc::new(transformer);
        let ledger = Ledger::with_options(
            store.clone(),
            Arc::new(StyleCatalog::builtin().unwrap()),
            transformer.clone(),
            LedgerOptions {
                transform_timeout: Duration::from_secs(5),
                ..LedgerOptions::default()
            },
        );

        Self {
            ledger,
            store,
            transformer,
            account_id,
        }
    }

    async fn convert(&self, style: &str) -> Result<artesia_ledger::ConversionReceipt, ConversionError> {
        self.ledger
            .request_conversion(&self.account_id, &StyleId::new(style).unwrap(), JPEG.to_vec())
            .await
    }

    fn account(&self) -> Account {
        self.store.get_account(&self.account_id).unwrap().unwrap()
    }

    fn conversions(&self) -> Vec<Conversion> {
        self.store
            .list_conversions_by_account(&self.account_id, 100, 0)
            .unwrap()
    }
}

// ============================================================================
// Success and failure paths
// ============================================================================

#[tokio::test]
async fn success_debits_exactly_one_credit() {
    let fx = Fixture::new(3, ScriptedTransformer::succeeding("a moody watercolor"));

    let receipt = fx.convert("watercolor").await.unwrap();

    assert_eq!(receipt.credits_remaining, 2);
    assert_eq!(receipt.result.description, "a moody watercolor");

    let account = fx.account();
    assert_eq!(account.balance, 2);
    assert_eq!(account.lifetime_used, 1);

    let conversions = fx.conversions();
    assert_eq!(conversions.len(), 1);
    let conversion = &conversions[0];
    assert_eq!(conversion.id, receipt.conversion_id);
    assert_eq!(conversion.status, ConversionStatus::Completed);
    assert_eq!(conversion.credits_charged, 1);
    assert_eq!(conversion.input_format, ImageFormat::Jpeg);
    assert!(conversion.completed_at.is_some());
    assert_eq!(conversion.result.as_ref(), Some(&receipt.result));
}

#[tokio::test]
async fn failure_restores_balance() {
    let fx = Fixture::new(3, ScriptedTransformer::failing("content policy"));

    let err = fx.convert("anime").await.unwrap_err();
    let ConversionError::TransformationFailed {
        conversion_id,
        reason,
        credits_remaining,
    } = err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert!(reason.contains("content policy"));
    assert_eq!(credits_remaining, 3);

    let account = fx.account();
    assert_eq!(account.balance, 3);
    assert_eq!(account.lifetime_used, 0);

    let conversion = fx.store.get_conversion(&conversion_id).unwrap().unwrap();
    assert_eq!(conversion.status, ConversionStatus::Failed);
    assert_eq!(conversion.credits_charged, 0);
    assert!(conversion.error.as_deref().unwrap().contains("content policy"));

    let kinds: Vec<_> = fx
        .store
        .list_transactions_by_account(&fx.account_id, 10, 0)
        .unwrap()
        .into_iter()
        .map(|tx| tx.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::ConversionRefund,
            TransactionKind::ConversionCharge,
            TransactionKind::TrialGrant,
        ]
    );
}

#[tokio::test]
async fn zero_balance_is_rejected_without_a_record() {
    let fx = Fixture::new(0, ScriptedTransformer::succeeding("unused"));

    let err = fx.convert("oil-painting").await.unwrap_err();

    assert!(matches!(
        err,
        ConversionError::InsufficientCredits {
            balance: 0,
            required: 1
        }
    ));
    assert!(fx.conversions().is_empty());
    assert_eq!(fx.transformer.calls(), 0);
}

#[tokio::test]
async fn unknown_style_mutates_nothing() {
    let fx = Fixture::new(2, ScriptedTransformer::succeeding("unused"));

    let err = fx.convert("claymation").await.unwrap_err();

    assert!(matches!(err, ConversionError::StyleNotFound { ref style_id } if style_id.as_str() == "claymation"));
    assert_eq!(fx.account().balance, 2);
    assert!(fx.conversions().is_empty());
    assert_eq!(fx.transformer.calls(), 0);
}

#[tokio::test]
async fn mixed_outcomes_charge_only_completions() {
    let transformer = ScriptedTransformer::succeeding("ok")
        .then(Script::Fail("first".into()))
        .then(Script::Succeed("second".into()))
        .then(Script::Fail("third".into()))
        .then(Script::Succeed("fourth".into()));
    let fx = Fixture::new(5, transformer);

    let mut completed = 0;
    for _ in 0..5 {
        if fx.convert("pop-art").await.is_ok() {
            completed += 1;
        }
    }

    assert_eq!(completed, 3);
    let account = fx.account();
    assert_eq!(account.balance, 5 - completed);
    assert_eq!(account.lifetime_used, completed);

    let charged: i64 = fx.conversions().iter().map(|c| c.credits_charged).sum();
    assert_eq!(charged, account.lifetime_used);
    assert!(fx.conversions().iter().all(Conversion::is_terminal));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn simultaneous_requests_at_balance_one() {
    let fx = Fixture::new(
        1,
        ScriptedTransformer::new(Script::Delay(Duration::from_millis(20), "done".into())),
    );

    let (a, b) = tokio::join!(fx.convert("cyberpunk"), fx.convert("cyberpunk"));

    let results = [a, b];
    let completed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ConversionError::InsufficientCredits { .. })))
        .count();
    assert_eq!((completed, rejected), (1, 1));

    assert_eq!(fx.account().balance, 0);
    let conversions = fx.conversions();
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0].status, ConversionStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_requests_never_overdraw_rocksdb() {
    let dir = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
    let fx = Arc::new(Fixture::with_store(
        store,
        3,
        ScriptedTransformer::new(Script::Delay(Duration::from_millis(5), "done".into())),
    ));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let fx = fx.clone();
            tokio::spawn(async move { fx.convert("fantasy-art").await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(ConversionError::InsufficientCredits { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(completed, 3);
    let account = fx.account();
    assert_eq!(account.balance, 0);
    assert_eq!(account.lifetime_used, 3);
}

// ============================================================================
// Untrusted transformer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn timeout_is_refunded() {
    let fx = Fixture::new(1, ScriptedTransformer::new(Script::Hang));

    let err = fx.convert("vintage-film").await.unwrap_err();

    let ConversionError::TransformationFailed { reason, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(reason.contains("timed out"));
    assert_eq!(fx.account().balance, 1);
    assert_eq!(fx.conversions()[0].status, ConversionStatus::Failed);
}

#[tokio::test]
async fn panic_is_refunded() {
    let fx = Fixture::new(1, ScriptedTransformer::new(Script::Panic("boom".into())));

    let err = fx.convert("pencil-sketch").await.unwrap_err();

    assert!(matches!(err, ConversionError::TransformationFailed { .. }));
    assert_eq!(fx.account().balance, 1);
    assert_eq!(fx.account().lifetime_used, 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_still_reconciles() {
    let fx = Fixture::new(
        1,
        ScriptedTransformer::new(Script::Delay(Duration::from_secs(2), "late".into())),
    );

    let abandoned = tokio::time::timeout(Duration::from_millis(100), fx.convert("anime")).await;
    assert!(abandoned.is_err());

    // The debit is committed and the detached task is still running.
    assert_eq!(fx.conversions()[0].status, ConversionStatus::Processing);

    tokio::time::sleep(Duration::from_secs(3)).await;

    let conversions = fx.conversions();
    assert_eq!(conversions[0].status, ConversionStatus::Completed);
    assert_eq!(fx.account().balance, 0);
}

// ============================================================================
// Recovery and exactly-once reconciliation
// ============================================================================

#[tokio::test]
async fn recovery_refunds_stranded_conversions() {
    let dir = tempfile::TempDir::new().unwrap();
    let account_id = AccountId::generate();
    let stranded = Conversion::begin(
        account_id,
        StyleId::new("watercolor").unwrap(),
        1,
        JPEG.len() as u64,
        ImageFormat::Jpeg,
    );

    {
        let store = RocksStore::open(dir.path()).unwrap();
        store
            .create_account(&Account::with_trial(account_id, 2))
            .unwrap();
        store.begin_conversion(&stranded).unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
    let ledger = Ledger::new(
        store.clone(),
        Arc::new(StyleCatalog::builtin().unwrap()),
        Arc::new(ScriptedTransformer::succeeding("unused")),
    );

    assert_eq!(ledger.recover_interrupted().await.unwrap(), 1);

    let conversion = store.get_conversion(&stranded.id).unwrap().unwrap();
    assert_eq!(conversion.status, ConversionStatus::Failed);
    let account = store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.balance, 2);
    assert_eq!(account.lifetime_used, 0);

    // Nothing left to do on a clean store.
    assert_eq!(ledger.recover_interrupted().await.unwrap(), 0);
    assert_eq!(store.get_account(&account_id).unwrap().unwrap().balance, 2);
}

#[tokio::test]
async fn terminal_conversions_reject_second_transition() {
    let fx = Fixture::new(2, ScriptedTransformer::succeeding("ok").then(Script::Fail("x".into())));

    let err = fx.convert("watercolor").await.unwrap_err();
    let ConversionError::TransformationFailed { conversion_id: failed, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    let completed = fx.convert("watercolor").await.unwrap().conversion_id;
    let before = fx.account();

    let again = fx.store.fail_conversion(&failed, "again").unwrap_err();
    assert!(matches!(again, StoreError::Transition(_)));

    let refund_completed = fx.store.fail_conversion(&completed, "late failure").unwrap_err();
    assert!(matches!(refund_completed, StoreError::Transition(_)));

    let complete_failed = fx
        .store
        .complete_conversion(
            &failed,
            artesia_core::ConversionOutput {
                description: "late".into(),
                model: "m".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(complete_failed, StoreError::Transition(_)));

    let after = fx.account();
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.lifetime_used, before.lifetime_used);
}
