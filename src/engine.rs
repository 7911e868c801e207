use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::db::ledger::LedgerStore;
use crate::db::models::{NewTransaction, TransactionKind, CATEGORY_TRANSFER};
use crate::db::StoreError;
use crate::fraud::is_suspicious;
use crate::location::{Coordinates, LocationSource};
use crate::notify::{Notifier, TransactionEvent};

/// Per-transaction ceiling for outgoing transfers.
pub const DAILY_TRANSFER_LIMIT: i64 = 100_000;

/// Outcome of a send-money or pay-bill call. Domain rejections (bad amount,
/// bad phone, insufficient funds) come back as `success = false` with a
/// human-readable message; only persistence failures surface as errors.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub suspicious: bool,
    pub message: String,
    pub new_balance: Decimal,
}

impl OperationResult {
    fn rejected(message: &str) -> Self {
        Self {
            success: false,
            suspicious: false,
            message: message.to_string(),
            new_balance: Decimal::ZERO,
        }
    }

    fn insufficient(balance: Decimal) -> Self {
        Self {
            success: false,
            suspicious: false,
            message: format!("Insufficient balance. Available: ₹{balance:.2}"),
            new_balance: balance,
        }
    }
}

/// One async mutex per account id. Mutating operations hold the locks of
/// every account they touch for the whole read-validate-write sequence, so
/// two in-flight debits can never both pass the sufficiency check on the same
/// stale balance.
#[derive(Default)]
struct AccountLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    fn slot(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(account_id).or_default().clone()
    }

    async fn acquire(&self, account_id: i64) -> OwnedMutexGuard<()> {
        self.slot(account_id).lock_owned().await
    }

    /// Lock both parties of a transfer in ascending-id order, so two
    /// simultaneous transfers in opposite directions cannot deadlock.
    /// A self-transfer takes a single lock.
    async fn acquire_pair(&self, a: i64, b: i64) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = vec![a, b];
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.acquire(id).await);
        }
        guards
    }
}

/// Validates and executes money movement. Every call names its acting user
/// explicitly; there is no ambient session.
pub struct TransactionEngine {
    store: LedgerStore,
    locks: AccountLocks,
    notifier: Arc<dyn Notifier>,
    location: Arc<dyn LocationSource>,
}

impl TransactionEngine {
    pub fn new(
        store: LedgerStore,
        notifier: Arc<dyn Notifier>,
        location: Arc<dyn LocationSource>,
    ) -> Self {
        Self {
            store,
            locks: AccountLocks::default(),
            notifier,
            location,
        }
    }

    /// Transfer `amount` from `user_id` to whoever owns `recipient_phone`.
    /// The recipient need not be registered; a registered recipient is
    /// credited and gets a RECEIVED ledger entry. All writes happen in one
    /// SQL transaction under the per-account locks.
    pub async fn send_money(
        &self,
        user_id: i64,
        recipient_phone: &str,
        amount: Decimal,
        latitude: f64,
        longitude: f64,
    ) -> Result<OperationResult, StoreError> {
        if amount <= Decimal::ZERO {
            return Ok(OperationResult::rejected("Amount must be greater than 0"));
        }
        if amount > Decimal::from(DAILY_TRANSFER_LIMIT) {
            return Ok(OperationResult::rejected(
                "Amount exceeds daily limit of ₹1,00,000",
            ));
        }
        if !is_valid_phone(recipient_phone) {
            return Ok(OperationResult::rejected(
                "Enter a valid 10-digit phone number",
            ));
        }

        let recipient = self.store.find_account_by_phone(recipient_phone).await?;

        let _guards = match &recipient {
            Some(r) => self.locks.acquire_pair(user_id, r.id).await,
            None => vec![self.locks.acquire(user_id).await],
        };

        let balance = self.store.get_balance(user_id).await?;
        if balance < amount {
            return Ok(OperationResult::insufficient(balance));
        }

        // Classified against the balance before the debit.
        let suspicious = is_suspicious(amount, balance);

        let sender = self
            .store
            .find_account_by_id(user_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("sender account {user_id} missing")))?;

        let recipient_name = recipient
            .as_ref()
            .map(|r| r.full_name.clone())
            .unwrap_or_else(|| recipient_phone.to_string());

        let new_balance = balance - amount;

        let mut tx = self.store.begin().await?;
        self.store.set_balance(&mut tx, user_id, new_balance).await?;
        self.store
            .append_transaction(
                &mut tx,
                &NewTransaction {
                    user_id,
                    kind: TransactionKind::Sent,
                    category: CATEGORY_TRANSFER.to_string(),
                    amount,
                    description: format!("Sent to {recipient_name}"),
                    counterparty_name: Some(recipient_name.clone()),
                    counterparty_phone: Some(recipient_phone.to_string()),
                    latitude,
                    longitude,
                },
            )
            .await?;

        if let Some(r) = &recipient {
            // Read inside the transaction so a self-transfer credits the
            // already-debited balance.
            let recipient_balance = self.store.balance_of(&mut tx, r.id).await?;
            self.store
                .set_balance(&mut tx, r.id, recipient_balance + amount)
                .await?;
            self.store
                .append_transaction(
                    &mut tx,
                    &NewTransaction {
                        user_id: r.id,
                        kind: TransactionKind::Received,
                        category: CATEGORY_TRANSFER.to_string(),
                        amount,
                        description: format!("Received from {}", sender.full_name),
                        counterparty_name: Some(sender.full_name.clone()),
                        counterparty_phone: Some(sender.phone.clone()),
                        latitude,
                        longitude,
                    },
                )
                .await?;
        }
        tx.commit().await?;

        self.location.report(Coordinates {
            latitude,
            longitude,
        });

        self.notifier
            .notify(TransactionEvent::Debited {
                user_id,
                amount,
                counterparty: recipient_name.clone(),
            })
            .await;
        if let Some(r) = &recipient {
            self.notifier
                .notify(TransactionEvent::Credited {
                    user_id: r.id,
                    amount,
                    counterparty: sender.full_name.clone(),
                })
                .await;
        }
        if suspicious {
            self.notifier
                .notify(TransactionEvent::SuspiciousTransfer { user_id, amount })
                .await;
        }

        Ok(OperationResult {
            success: true,
            suspicious,
            message: format!("₹{amount:.2} sent to {recipient_name}"),
            new_balance,
        })
    }

    /// Pay a bill: debit plus one BILL_PAYMENT ledger entry and one PAID bill
    /// record, in a single SQL transaction. Geolocation is best-effort from
    /// the last known fix.
    pub async fn pay_bill(
        &self,
        user_id: i64,
        bill_type: &str,
        amount: Decimal,
    ) -> Result<OperationResult, StoreError> {
        if amount <= Decimal::ZERO {
            return Ok(OperationResult::rejected("Amount must be greater than 0"));
        }

        let _guard = self.locks.acquire(user_id).await;

        let balance = self.store.get_balance(user_id).await?;
        if balance < amount {
            return Ok(OperationResult::insufficient(balance));
        }

        let new_balance = balance - amount;
        let coords = self.location.last_known().unwrap_or(Coordinates::ORIGIN);

        let mut tx = self.store.begin().await?;
        self.store.set_balance(&mut tx, user_id, new_balance).await?;
        self.store
            .append_transaction(
                &mut tx,
                &NewTransaction {
                    user_id,
                    kind: TransactionKind::BillPayment,
                    category: bill_type.to_string(),
                    amount,
                    description: format!("{bill_type} bill payment"),
                    counterparty_name: Some(format!("{bill_type} Provider")),
                    counterparty_phone: None,
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                },
            )
            .await?;
        self.store.append_bill(&mut tx, user_id, bill_type, amount).await?;
        tx.commit().await?;

        self.notifier
            .notify(TransactionEvent::BillPaid {
                user_id,
                bill_type: bill_type.to_string(),
                amount,
            })
            .await;

        Ok(OperationResult {
            success: true,
            suspicious: false,
            message: format!("{bill_type} bill of ₹{amount:.2} paid!"),
            new_balance,
        })
    }
}

fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}
