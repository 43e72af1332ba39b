//! Transfer Coordinator
//!
//! Drives one transfer through the FSM in [`super::state`]:
//! validate, convert (only across currencies), check balance, then apply
//! both balance deltas and the transfer record inside one unit of work.
//!
//! Nothing is written before APPLYING, so every abort before that state
//! needs no compensation. Aborts inside APPLYING are undone by rollback.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::state::TransferState;
use super::types::{NewTransfer, TransferRequest, TransferResult};
use super::unit_of_work::{exec_tx, UnitOfWork};
use crate::account::{Account, AccountStore};
use crate::context::RequestContext;
use crate::converter::CurrencyConverter;
use crate::core_types::AccountId;
use crate::error::LedgerError;
use crate::money::{Money, MINOR_UNITS};

/// Tracks the current FSM state of one transfer and logs every move.
struct Progress {
    state: TransferState,
    source: AccountId,
    target: AccountId,
}

impl Progress {
    fn new(req: &TransferRequest) -> Self {
        Self {
            state: TransferState::Validating,
            source: req.source_account_id,
            target: req.target_account_id,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(
            source = self.source,
            target = self.target,
            from = %self.state,
            to = %next,
            "Transfer state transition"
        );
        self.state = next;
    }

    fn abort(&mut self, err: LedgerError) -> LedgerError {
        warn!(
            source = self.source,
            target = self.target,
            state = %self.state,
            code = err.code(),
            error = %err,
            "Transfer aborted"
        );
        self.state = TransferState::Aborted;
        err
    }
}

/// Transfer orchestrator. Holds no balances of its own; every read goes to
/// the account store.
pub struct TransferCoordinator {
    accounts: Arc<dyn AccountStore>,
    uow: Arc<dyn UnitOfWork>,
    converter: Arc<dyn CurrencyConverter>,
}

impl TransferCoordinator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        uow: Arc<dyn UnitOfWork>,
        converter: Arc<dyn CurrencyConverter>,
    ) -> Self {
        Self {
            accounts,
            uow,
            converter,
        }
    }

    /// Move money from `req.source_account_id` to `req.target_account_id`.
    ///
    /// The source is debited `req.amount`; the target is credited the
    /// converted amount, which is also what the transfer record stores,
    /// in the target's currency. Not idempotent: two calls move money twice.
    pub async fn transfer(
        &self,
        ctx: &RequestContext,
        req: TransferRequest,
    ) -> Result<TransferResult, LedgerError> {
        let mut progress = Progress::new(&req);
        match self.drive(ctx, &req, &mut progress).await {
            Ok(result) => {
                progress.advance(TransferState::Committed);
                info!(
                    transfer_id = result.transfer.id,
                    source = req.source_account_id,
                    target = req.target_account_id,
                    debit = %req.amount,
                    credit = %result.transfer.amount,
                    currency = %result.transfer.currency,
                    "Transfer committed"
                );
                Ok(result)
            }
            Err(err) => Err(progress.abort(err)),
        }
    }

    async fn drive(
        &self,
        ctx: &RequestContext,
        req: &TransferRequest,
        progress: &mut Progress,
    ) -> Result<TransferResult, LedgerError> {
        let [source, target] = self.validate(ctx, req).await?;

        let credit = if source.currency == target.currency {
            req.amount
        } else {
            progress.advance(TransferState::Converting);
            self.convert(ctx, &source, &target, req.amount).await?
        };

        progress.advance(TransferState::CheckingBalance);
        ensure_sufficient(source.balance, credit)?;

        progress.advance(TransferState::Applying);
        self.apply(ctx, req.amount, credit, &source, &target).await
    }

    /// Identity, amount, existence, then request currency. No writes.
    async fn validate(
        &self,
        ctx: &RequestContext,
        req: &TransferRequest,
    ) -> Result<[Account; 2], LedgerError> {
        if req.source_account_id == req.target_account_id {
            return Err(LedgerError::IdenticalAccount);
        }
        validate_amount(req.amount)?;

        let [source, target] = self
            .accounts
            .validate_accounts(ctx, req.source_account_id, req.target_account_id)
            .await?;

        if req.currency != source.currency {
            return Err(LedgerError::CurrencyMismatch {
                requested: req.currency.to_string(),
                account: source.currency.to_string(),
            });
        }
        Ok([source, target])
    }

    async fn convert(
        &self,
        ctx: &RequestContext,
        source: &Account,
        target: &Account,
        amount: Money,
    ) -> Result<Money, LedgerError> {
        let converted = ctx
            .run(async {
                self.converter
                    .convert(&source.currency, &target.currency, amount)
                    .await
                    .map_err(|e| LedgerError::CurrencyConversionFailed(e.to_string()))
            })
            .await?;

        if !converted.is_positive() {
            return Err(LedgerError::CurrencyConversionFailed(format!(
                "{} {} converts to {} {}",
                amount, source.currency, converted, target.currency
            )));
        }
        debug!(
            from = %source.currency,
            to = %target.currency,
            amount = %amount,
            converted = %converted,
            "Amount converted"
        );
        Ok(converted)
    }

    /// Debit, credit and record inside one unit of work.
    ///
    /// Deltas are applied in ascending account id order so two opposite
    /// transfers between the same pair lock rows in the same order. The
    /// balance is checked again against the locked row, since the snapshot
    /// read during validation may be stale under concurrent transfers.
    async fn apply(
        &self,
        ctx: &RequestContext,
        debit: Money,
        credit: Money,
        source: &Account,
        target: &Account,
    ) -> Result<TransferResult, LedgerError> {
        let (source_id, target_id) = (source.id, target.id);
        let currency = target.currency.clone();

        exec_tx(self.uow.as_ref(), ctx, move |tx| {
            Box::pin(async move {
                let (source_account, target_account) = if source_id < target_id {
                    let s = tx.add_balance(source_id, -debit).await?;
                    let t = tx.add_balance(target_id, credit).await?;
                    (s, t)
                } else {
                    let t = tx.add_balance(target_id, credit).await?;
                    let s = tx.add_balance(source_id, -debit).await?;
                    (s, t)
                };

                // Row is locked now; balance before our debit is exact.
                ensure_sufficient(source_account.balance + debit, credit)?;

                let transfer = tx
                    .insert_transfer(NewTransfer {
                        source_account_id: source_id,
                        target_account_id: target_id,
                        amount: credit,
                        currency,
                    })
                    .await?;

                Ok(TransferResult {
                    transfer,
                    source_account,
                    target_account,
                })
            })
        })
        .await
    }
}

fn validate_amount(amount: Money) -> Result<(), LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }
    if !amount.fits_minor_units() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, MINOR_UNITS
        )));
    }
    Ok(())
}

/// Equality passes: a transfer may empty the source.
fn ensure_sufficient(balance: Money, required: Money) -> Result<(), LedgerError> {
    if balance < required {
        return Err(LedgerError::InsufficientBalance {
            balance: balance.to_string(),
            required: required.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{CurrencyCode, NewAccount};
    use crate::converter::FixedRateConverter;
    use crate::store::MemoryStore;
    use crate::transfer::TransferLog;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryStore>,
        converter: Arc<FixedRateConverter>,
        coordinator: TransferCoordinator,
    }

    fn fixture(converter: FixedRateConverter) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let converter = Arc::new(converter);
        let coordinator =
            TransferCoordinator::new(store.clone(), store.clone(), converter.clone());
        Fixture {
            store,
            converter,
            coordinator,
        }
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    async fn open(store: &MemoryStore, balance: Money, currency: &str) -> Account {
        AccountStore::insert(
            store,
            &RequestContext::background(),
            NewAccount::new(balance, code(currency)),
        )
        .await
        .unwrap()
    }

    async fn balance(store: &MemoryStore, id: AccountId) -> Money {
        AccountStore::get(store, &RequestContext::background(), id)
            .await
            .unwrap()
            .balance
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::new(dec!(0.01))).is_ok());
        assert!(matches!(
            validate_amount(Money::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(Money::new(dec!(-5))),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(Money::new(dec!(1.001))),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_ensure_sufficient_allows_equality() {
        assert!(ensure_sufficient(Money::new(dec!(10)), Money::new(dec!(10.00))).is_ok());
        assert!(matches!(
            ensure_sufficient(Money::new(dec!(9.99)), Money::new(dec!(10))),
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_same_currency_transfer() {
        let f = fixture(FixedRateConverter::new());
        let a = open(&f.store, Money::new(dec!(1000.00)), "USD").await;
        let b = open(&f.store, Money::ZERO, "USD").await;

        let result = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(1000.00)), code("USD")),
            )
            .await
            .unwrap();

        assert_eq!(result.source_account.balance, Money::ZERO);
        assert_eq!(result.target_account.balance, Money::new(dec!(1000.00)));
        assert_eq!(result.transfer.amount, Money::new(dec!(1000.00)));
        assert_eq!(result.transfer.currency, code("USD"));
        assert_eq!(f.converter.calls(), 0);
    }

    #[tokio::test]
    async fn test_cross_currency_transfer_records_target_currency() {
        let f = fixture(FixedRateConverter::new().with_rate("USD", "EUR", dec!(0.90)));
        let a = open(&f.store, Money::new(dec!(100.00)), "USD").await;
        let b = open(&f.store, Money::ZERO, "EUR").await;

        let result = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(100.00)), code("USD")),
            )
            .await
            .unwrap();

        assert_eq!(result.source_account.balance, Money::ZERO);
        assert_eq!(result.target_account.balance, Money::new(dec!(90.00)));
        assert_eq!(result.transfer.amount, Money::new(dec!(90.00)));
        assert_eq!(result.transfer.currency, code("EUR"));
        assert_eq!(f.converter.calls(), 1);
    }

    #[tokio::test]
    async fn test_identical_account_rejected_before_anything_else() {
        let f = fixture(FixedRateConverter::new());
        let a = open(&f.store, Money::new(dec!(50)), "USD").await;

        for amount in [Money::ZERO, Money::new(dec!(10)), Money::new(dec!(-1))] {
            let err = f
                .coordinator
                .transfer(
                    &RequestContext::background(),
                    TransferRequest::new(a.id, a.id, amount, code("USD")),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::IdenticalAccount));
        }
        assert_eq!(balance(&f.store, a.id).await, Money::new(dec!(50)));
    }

    #[tokio::test]
    async fn test_missing_account() {
        let f = fixture(FixedRateConverter::new());
        let a = open(&f.store, Money::new(dec!(50)), "USD").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, 999, Money::new(dec!(1)), code("USD")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountsMissing));
        assert_eq!(balance(&f.store, a.id).await, Money::new(dec!(50)));
    }

    #[tokio::test]
    async fn test_request_currency_must_match_source() {
        let f = fixture(FixedRateConverter::new().with_rate("USD", "EUR", dec!(0.9)));
        let a = open(&f.store, Money::new(dec!(50)), "USD").await;
        let b = open(&f.store, Money::ZERO, "EUR").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(1)), code("EUR")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CurrencyMismatch { .. }));
        assert_eq!(f.converter.calls(), 0);
    }

    #[tokio::test]
    async fn test_conversion_failure_leaves_balances() {
        let f = fixture(FixedRateConverter::failing("connection refused"));
        let a = open(&f.store, Money::new(dec!(100.00)), "USD").await;
        let b = open(&f.store, Money::ZERO, "EUR").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(100.00)), code("USD")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::CurrencyConversionFailed(_)));
        assert_eq!(balance(&f.store, a.id).await, Money::new(dec!(100.00)));
        assert_eq!(balance(&f.store, b.id).await, Money::ZERO);
        let log = TransferLog::get_all(f.store.as_ref(), &RequestContext::background())
            .await
            .unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_conversion_rounding_to_zero_rejected() {
        let f = fixture(FixedRateConverter::new().with_rate("USD", "JPY", dec!(0.001)));
        let a = open(&f.store, Money::new(dec!(1)), "USD").await;
        let b = open(&f.store, Money::ZERO, "JPY").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(0.01)), code("USD")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CurrencyConversionFailed(_)));
    }

    #[tokio::test]
    async fn test_insufficient_balance_uses_converted_amount() {
        // 100 USD at 1.50 is 150 EUR, more than the 120 USD balance
        let f = fixture(FixedRateConverter::new().with_rate("USD", "EUR", dec!(1.50)));
        let a = open(&f.store, Money::new(dec!(120.00)), "USD").await;
        let b = open(&f.store, Money::ZERO, "EUR").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(a.id, b.id, Money::new(dec!(100.00)), code("USD")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(balance(&f.store, a.id).await, Money::new(dec!(120.00)));
    }

    #[tokio::test]
    async fn test_descending_ids_report_source_then_target() {
        let f = fixture(FixedRateConverter::new());
        let low = open(&f.store, Money::ZERO, "USD").await;
        let high = open(&f.store, Money::new(dec!(30)), "USD").await;

        let result = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(high.id, low.id, Money::new(dec!(30)), code("USD")),
            )
            .await
            .unwrap();

        assert_eq!(result.source_account.id, high.id);
        assert_eq!(result.source_account.balance, Money::ZERO);
        assert_eq!(result.target_account.id, low.id);
        assert_eq!(result.target_account.balance, Money::new(dec!(30)));
        assert_eq!(result.transfer.source_account_id, high.id);
    }

    #[tokio::test]
    async fn test_conversion_overflow_is_conversion_failure() {
        let f = fixture(FixedRateConverter::new().with_rate("USD", "EUR", dec!(1.11)));
        let a = open(&f.store, Money::new(Decimal::MAX), "USD").await;
        let b = open(&f.store, Money::ZERO, "EUR").await;

        let err = f
            .coordinator
            .transfer(
                &RequestContext::background(),
                TransferRequest::new(
                    a.id,
                    b.id,
                    Money::new(Decimal::MAX),
                    code("USD"),
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::CurrencyConversionFailed(_)));
        assert_eq!(balance(&f.store, a.id).await, Money::new(Decimal::MAX));
        assert_eq!(balance(&f.store, b.id).await, Money::ZERO);
        assert!(TransferLog::get_all(f.store.as_ref(), &RequestContext::background())
            .await
            .unwrap()
            .is_empty());
    }
}
