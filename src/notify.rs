use async_trait::async_trait;
use rust_decimal::Decimal;

/// What happened, from the account owner's point of view. Mirrors the
/// notification categories shown to the user after a successful operation.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    Debited {
        user_id: i64,
        amount: Decimal,
        counterparty: String,
    },
    Credited {
        user_id: i64,
        amount: Decimal,
        counterparty: String,
    },
    BillPaid {
        user_id: i64,
        bill_type: String,
        amount: Decimal,
    },
    SuspiciousTransfer {
        user_id: i64,
        amount: Decimal,
    },
}

/// Observational collaborator informed after a successful operation has
/// committed. Implementations cannot fail the transaction; they are invoked
/// after the fact and their outcome is ignored.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: TransactionEvent);
}

/// Default notifier: structured log lines.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: TransactionEvent) {
        match event {
            TransactionEvent::Debited {
                user_id,
                amount,
                counterparty,
            } => {
                tracing::info!("notify user {user_id}: ₹{amount} sent to {counterparty}");
            }
            TransactionEvent::Credited {
                user_id,
                amount,
                counterparty,
            } => {
                tracing::info!("notify user {user_id}: ₹{amount} received from {counterparty}");
            }
            TransactionEvent::BillPaid {
                user_id,
                bill_type,
                amount,
            } => {
                tracing::info!("notify user {user_id}: {bill_type} bill of ₹{amount} paid");
            }
            TransactionEvent::SuspiciousTransfer { user_id, amount } => {
                tracing::warn!("notify user {user_id}: transfer of ₹{amount} flagged for review");
            }
        }
    }
}
