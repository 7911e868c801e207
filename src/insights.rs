use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::ledger::LedgerStore;
use crate::db::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub total: Decimal,
}

/// One month of rollups for one account. A month with no activity is all
/// zeros with an empty category list, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyInsights {
    /// The "YYYY-MM" month key the figures are scoped to.
    pub month: String,
    /// SENT + BILL_PAYMENT amounts.
    pub total_spent: Decimal,
    /// RECEIVED amounts.
    pub total_received: Decimal,
    pub by_category: Vec<CategorySpend>,
}

/// Read-only rollups over the ledger store. No caching; every call recomputes
/// from the current ledger contents.
pub struct InsightsAggregator {
    store: LedgerStore,
}

impl InsightsAggregator {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub async fn monthly_insights(
        &self,
        user_id: i64,
        month_key: &str,
    ) -> Result<MonthlyInsights, StoreError> {
        let total_spent = self.store.total_spent_in_month(user_id, month_key).await?;
        let total_received = self
            .store
            .total_received_in_month(user_id, month_key)
            .await?;
        let by_category = self
            .store
            .spending_by_category(user_id, month_key)
            .await?
            .into_iter()
            .map(|(category, total)| CategorySpend { category, total })
            .collect();

        Ok(MonthlyInsights {
            month: month_key.to_string(),
            total_spent,
            total_received,
            by_category,
        })
    }
}

/// A month key is "YYYY-MM"; anything else would silently match nothing, so
/// the route layer rejects it up front.
pub fn is_valid_month_key(month_key: &str) -> bool {
    let Some((year, month)) = month_key.split_once('-') else {
        return false;
    };
    year.len() == 4
        && year.bytes().all(|b| b.is_ascii_digit())
        && month.len() == 2
        && matches!(month.parse::<u8>(), Ok(1..=12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::auth::AuthRepository;
    use crate::engine::TransactionEngine;
    use crate::location::LastFixCache;
    use crate::notify::LogNotifier;

    #[tokio::test]
    async fn empty_month_rolls_up_to_zeros() {
        let pool = crate::db::connect_test().await;
        let store = LedgerStore::new(pool.clone());
        let repo = AuthRepository::new(pool);
        let user = repo
            .create_account("asha", "hash", "Asha Rao", "9000000001", "AC1", Decimal::from(10_000))
            .await
            .unwrap()
            .id;

        let insights = InsightsAggregator::new(store)
            .monthly_insights(user, "1999-01")
            .await
            .unwrap();
        assert_eq!(insights.total_spent, Decimal::ZERO);
        assert_eq!(insights.total_received, Decimal::ZERO);
        assert!(insights.by_category.is_empty());
    }

    #[tokio::test]
    async fn current_month_reflects_engine_activity() {
        let pool = crate::db::connect_test().await;
        let store = LedgerStore::new(pool.clone());
        let repo = AuthRepository::new(pool);
        let sender = repo
            .create_account("asha", "hash", "Asha Rao", "9000000001", "AC1", Decimal::from(10_000))
            .await
            .unwrap()
            .id;
        let recipient = repo
            .create_account("ravi", "hash", "Ravi Kumar", "9000000002", "AC2", Decimal::ZERO)
            .await
            .unwrap()
            .id;

        let engine = TransactionEngine::new(
            store.clone(),
            Arc::new(LogNotifier),
            Arc::new(LastFixCache::default()),
        );
        engine
            .send_money(sender, "9000000002", Decimal::from(1_500), 0.0, 0.0)
            .await
            .unwrap();
        engine
            .pay_bill(sender, "Electricity", Decimal::from(700))
            .await
            .unwrap();

        let aggregator = InsightsAggregator::new(store);
        let month = crate::db::current_month();

        let spent_side = aggregator.monthly_insights(sender, &month).await.unwrap();
        assert_eq!(spent_side.total_spent, Decimal::from(2_200));
        assert_eq!(spent_side.total_received, Decimal::ZERO);
        assert_eq!(spent_side.by_category.len(), 2);
        assert_eq!(spent_side.by_category[0].category, "Transfer");
        assert_eq!(spent_side.by_category[0].total, Decimal::from(1_500));
        assert_eq!(spent_side.by_category[1].category, "Electricity");
        assert_eq!(spent_side.by_category[1].total, Decimal::from(700));

        let received_side = aggregator.monthly_insights(recipient, &month).await.unwrap();
        assert_eq!(received_side.total_spent, Decimal::ZERO);
        assert_eq!(received_side.total_received, Decimal::from(1_500));
        assert!(received_side.by_category.is_empty());
    }

    #[test]
    fn month_key_validation() {
        assert!(is_valid_month_key("2026-02"));
        assert!(is_valid_month_key("1999-12"));
        assert!(!is_valid_month_key("2026-13"));
        assert!(!is_valid_month_key("2026-00"));
        assert!(!is_valid_month_key("2026-2"));
        assert!(!is_valid_month_key("202602"));
        assert!(!is_valid_month_key("2026-02-19"));
    }
}
