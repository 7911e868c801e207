use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::models::{
    Account, Bill, BillStatus, NewTransaction, SavingsGoal, TransactionKind, TransactionRecord,
    TransactionStatus,
};
use super::{now_for_db, StoreError};

/// Filters for history queries. Results are always newest-first.
#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    /// Inclusive start date, "YYYY-MM-DD".
    pub from: Option<String>,
    /// Inclusive end date, "YYYY-MM-DD" (extended to end of day).
    pub to: Option<String>,
    pub kind: Option<TransactionKind>,
    pub limit: Option<i64>,
}

impl HistoryFilter {
    pub fn recent(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Durable record of account balances and the append-only transaction and
/// bill logs. Mutating methods take a live connection so the engine can scope
/// a whole money movement to a single SQL transaction.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a SQL transaction for a money-movement operation.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    // ── balances ─────────────────────────────────────────────────────────

    /// Current balance, zero for an unknown account id (matching the
    /// behaviour history views were built against).
    pub async fn get_balance(&self, user_id: i64) -> Result<Decimal, StoreError> {
        let mut conn = self.pool.acquire().await?;
        self.balance_of(&mut conn, user_id).await
    }

    pub async fn balance_of(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Decimal, StoreError> {
        let row = sqlx::query("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<String, _>("balance")?.parse::<Decimal>()?),
            None => Ok(Decimal::ZERO),
        }
    }

    pub async fn set_balance(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
            .bind(new_balance.to_string())
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    // ── accounts ─────────────────────────────────────────────────────────

    pub async fn find_account_by_id(&self, user_id: i64) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| map_account(&row)).transpose()
    }

    pub async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| map_account(&row)).transpose()
    }

    // ── transaction log ──────────────────────────────────────────────────

    /// Append one immutable ledger entry. Timestamp and SUCCESS status are
    /// assigned here; the row is never touched again.
    pub async fn append_transaction(
        &self,
        conn: &mut SqliteConnection,
        entry: &NewTransaction,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions
                (user_id, type, category, amount, description,
                 to_from_name, to_from_phone, date_time, latitude, longitude, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.kind.as_str())
        .bind(&entry.category)
        .bind(entry.amount.to_string())
        .bind(&entry.description)
        .bind(&entry.counterparty_name)
        .bind(&entry.counterparty_phone)
        .bind(now_for_db())
        .bind(entry.latitude)
        .bind(entry.longitude)
        .bind(TransactionStatus::Success.as_str())
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.try_get("id")?)
    }

    /// History query: newest first, optional date range / kind / limit.
    pub async fn transactions_for_user(
        &self,
        user_id: i64,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM transactions WHERE user_id = ");
        builder.push_bind(user_id);

        if let Some(from) = &filter.from {
            builder.push(" AND date_time >= ").push_bind(from.clone());
        }
        if let Some(to) = &filter.to {
            builder
                .push(" AND date_time <= ")
                .push_bind(format!("{to} 23:59:59"));
        }
        if let Some(kind) = filter.kind {
            builder.push(" AND type = ").push_bind(kind.as_str());
        }

        builder.push(" ORDER BY date_time DESC, id DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_transaction).collect()
    }

    // ── bill log ─────────────────────────────────────────────────────────

    pub async fn append_bill(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        bill_type: &str,
        amount: Decimal,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO bills (user_id, bill_type, amount, paid_at, status)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(bill_type)
        .bind(amount.to_string())
        .bind(now_for_db())
        .bind(BillStatus::Paid.as_str())
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.try_get("id")?)
    }

    pub async fn bills_for_user(&self, user_id: i64) -> Result<Vec<Bill>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM bills WHERE user_id = ? ORDER BY paid_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_bill).collect()
    }

    // ── month-scoped aggregates (read by the insights aggregator) ────────

    /// Sum of outgoing amounts (SENT + BILL_PAYMENT) within the month.
    pub async fn total_spent_in_month(
        &self,
        user_id: i64,
        month_key: &str,
    ) -> Result<Decimal, StoreError> {
        let rows = self.month_rows(user_id, month_key, true).await?;
        sum_amounts(&rows)
    }

    /// Sum of RECEIVED amounts within the month.
    pub async fn total_received_in_month(
        &self,
        user_id: i64,
        month_key: &str,
    ) -> Result<Decimal, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT amount FROM transactions
            WHERE user_id = ? AND type = 'RECEIVED' AND date_time LIKE ?
            "#,
        )
        .bind(user_id)
        .bind(format!("{month_key}%"))
        .fetch_all(&self.pool)
        .await?;
        sum_amounts(&rows)
    }

    /// Outgoing spend grouped by category, first-seen order preserved.
    pub async fn spending_by_category(
        &self,
        user_id: i64,
        month_key: &str,
    ) -> Result<Vec<(String, Decimal)>, StoreError> {
        let rows = self.month_rows(user_id, month_key, false).await?;

        // Amounts are decimal TEXT, so grouping and summing happen here
        // rather than in SQL.
        let mut categories: Vec<(String, Decimal)> = Vec::new();
        for row in &rows {
            let category: Option<String> = row.try_get("category")?;
            let category = category.unwrap_or_default();
            let amount = row.try_get::<String, _>("amount")?.parse::<Decimal>()?;
            match categories.iter_mut().find(|(name, _)| *name == category) {
                Some((_, total)) => *total += amount,
                None => categories.push((category, amount)),
            }
        }
        Ok(categories)
    }

    async fn month_rows(
        &self,
        user_id: i64,
        month_key: &str,
        amount_only: bool,
    ) -> Result<Vec<SqliteRow>, StoreError> {
        let columns = if amount_only { "amount" } else { "category, amount" };
        let sql = format!(
            r#"
            SELECT {columns} FROM transactions
            WHERE user_id = ? AND type IN ('SENT', 'BILL_PAYMENT')
              AND date_time LIKE ?
            ORDER BY date_time ASC, id ASC
            "#
        );
        Ok(sqlx::query(&sql)
            .bind(user_id)
            .bind(format!("{month_key}%"))
            .fetch_all(&self.pool)
            .await?)
    }

    // ── savings goals (collaborator surface, untouched by the engine) ────

    pub async fn insert_goal(
        &self,
        user_id: i64,
        goal_name: &str,
        target_amount: Decimal,
    ) -> Result<SavingsGoal, StoreError> {
        let created_at = now_for_db();
        let row = sqlx::query(
            r#"
            INSERT INTO savings_goals (user_id, goal_name, target_amount, current_amount, created_at)
            VALUES (?, ?, ?, '0', ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(goal_name)
        .bind(target_amount.to_string())
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(SavingsGoal {
            id: row.try_get("id")?,
            user_id,
            goal_name: goal_name.to_string(),
            target_amount,
            current_amount: Decimal::ZERO,
            created_at,
        })
    }

    pub async fn goals_for_user(&self, user_id: i64) -> Result<Vec<SavingsGoal>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM savings_goals WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_goal).collect()
    }

    /// Returns false when the goal does not belong to the user (or is gone).
    pub async fn update_goal_amount(
        &self,
        user_id: i64,
        goal_id: i64,
        current_amount: Decimal,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE savings_goals SET current_amount = ? WHERE id = ? AND user_id = ?",
        )
        .bind(current_amount.to_string())
        .bind(goal_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn sum_amounts(rows: &[SqliteRow]) -> Result<Decimal, StoreError> {
    let mut total = Decimal::ZERO;
    for row in rows {
        total += row.try_get::<String, _>("amount")?.parse::<Decimal>()?;
    }
    Ok(total)
}

pub(crate) fn map_account(row: &SqliteRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        account_no: row.try_get("account_no")?,
        balance: row.try_get::<String, _>("balance")?.parse::<Decimal>()?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_transaction(row: &SqliteRow) -> Result<TransactionRecord, StoreError> {
    Ok(TransactionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: row
            .try_get::<String, _>("type")?
            .parse()
            .map_err(StoreError::Corrupt)?,
        category: row.try_get("category")?,
        amount: row.try_get::<String, _>("amount")?.parse::<Decimal>()?,
        description: row.try_get("description")?,
        counterparty_name: row.try_get("to_from_name")?,
        counterparty_phone: row.try_get("to_from_phone")?,
        date_time: row.try_get("date_time")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?,
    })
}

fn map_goal(row: &SqliteRow) -> Result<SavingsGoal, StoreError> {
    Ok(SavingsGoal {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        goal_name: row.try_get("goal_name")?,
        target_amount: row
            .try_get::<String, _>("target_amount")?
            .parse::<Decimal>()?,
        current_amount: row
            .try_get::<String, _>("current_amount")?
            .parse::<Decimal>()?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_bill(row: &SqliteRow) -> Result<Bill, StoreError> {
    Ok(Bill {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        bill_type: row.try_get("bill_type")?,
        amount: row.try_get::<String, _>("amount")?.parse::<Decimal>()?,
        paid_at: row.try_get("paid_at")?,
        status: row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::auth::AuthRepository;
    use crate::db::models::CATEGORY_TRANSFER;

    async fn setup() -> (LedgerStore, i64) {
        let pool = crate::db::connect_test().await;
        let repo = AuthRepository::new(pool.clone());
        let account = repo
            .create_account("asha", "hash", "Asha Rao", "9000000001", "AC1000000001", Decimal::from(10_000))
            .await
            .expect("failed to create account");
        (LedgerStore::new(pool), account.id)
    }

    fn transfer_out(user_id: i64, amount: i64) -> NewTransaction {
        NewTransaction {
            user_id,
            kind: TransactionKind::Sent,
            category: CATEGORY_TRANSFER.to_string(),
            amount: Decimal::from(amount),
            description: "Sent to 9111111111".to_string(),
            counterparty_name: Some("9111111111".to_string()),
            counterparty_phone: Some("9111111111".to_string()),
            latitude: 12.97,
            longitude: 77.59,
        }
    }

    #[tokio::test]
    async fn balance_round_trips_exactly() {
        let (store, user_id) = setup().await;
        assert_eq!(store.get_balance(user_id).await.unwrap(), Decimal::from(10_000));

        let mut tx = store.begin().await.unwrap();
        store
            .set_balance(&mut tx, user_id, "123.45".parse().unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_balance(user_id).await.unwrap(), "123.45".parse().unwrap());
    }

    #[tokio::test]
    async fn unknown_account_has_zero_balance() {
        let (store, _) = setup().await;
        assert_eq!(store.get_balance(404).await.unwrap(), Decimal::ZERO);
        assert!(store.find_account_by_id(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_account_by_phone_matches_exactly() {
        let (store, user_id) = setup().await;
        let found = store.find_account_by_phone("9000000001").await.unwrap().unwrap();
        assert_eq!(found.id, user_id);
        assert_eq!(found.full_name, "Asha Rao");
        assert!(store.find_account_by_phone("9999999990").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn appended_transactions_come_back_newest_first() {
        let (store, user_id) = setup().await;
        let mut tx = store.begin().await.unwrap();
        let first = store.append_transaction(&mut tx, &transfer_out(user_id, 100)).await.unwrap();
        let second = store.append_transaction(&mut tx, &transfer_out(user_id, 200)).await.unwrap();
        tx.commit().await.unwrap();
        assert!(second > first);

        let history = store
            .transactions_for_user(user_id, &HistoryFilter::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        // Same timestamp second, so the id tie-break keeps insertion order reversed.
        assert_eq!(history[0].id, second);
        assert_eq!(history[0].amount, Decimal::from(200));
        assert_eq!(history[0].status, TransactionStatus::Success);
        assert_eq!(history[1].id, first);
    }

    #[tokio::test]
    async fn history_filters_by_kind_and_limit() {
        let (store, user_id) = setup().await;
        let mut tx = store.begin().await.unwrap();
        store.append_transaction(&mut tx, &transfer_out(user_id, 100)).await.unwrap();
        store.append_transaction(&mut tx, &transfer_out(user_id, 200)).await.unwrap();
        store
            .append_transaction(
                &mut tx,
                &NewTransaction {
                    kind: TransactionKind::Received,
                    ..transfer_out(user_id, 300)
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let sent = store
            .transactions_for_user(
                user_id,
                &HistoryFilter {
                    kind: Some(TransactionKind::Sent),
                    ..HistoryFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|t| t.kind == TransactionKind::Sent));

        let recent = store
            .transactions_for_user(user_id, &HistoryFilter::recent(1))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].amount, Decimal::from(300));
    }

    #[tokio::test]
    async fn history_date_range_is_inclusive_of_end_day() {
        let (store, user_id) = setup().await;
        let mut tx = store.begin().await.unwrap();
        store.append_transaction(&mut tx, &transfer_out(user_id, 100)).await.unwrap();
        tx.commit().await.unwrap();

        let today = crate::db::now_for_db()[..10].to_string();
        let hits = store
            .transactions_for_user(
                user_id,
                &HistoryFilter {
                    from: Some(today.clone()),
                    to: Some(today),
                    ..HistoryFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .transactions_for_user(
                user_id,
                &HistoryFilter {
                    from: Some("1999-01-01".to_string()),
                    to: Some("1999-12-31".to_string()),
                    ..HistoryFilter::default()
                },
            )
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn bills_round_trip() {
        let (store, user_id) = setup().await;
        let mut tx = store.begin().await.unwrap();
        store
            .append_bill(&mut tx, user_id, "Electricity", "740.25".parse().unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let bills = store.bills_for_user(user_id).await.unwrap();
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].bill_type, "Electricity");
        assert_eq!(bills[0].amount, "740.25".parse().unwrap());
        assert_eq!(bills[0].status, BillStatus::Paid);
    }

    #[tokio::test]
    async fn month_aggregates_split_by_direction() {
        let (store, user_id) = setup().await;
        let mut tx = store.begin().await.unwrap();
        store.append_transaction(&mut tx, &transfer_out(user_id, 150)).await.unwrap();
        store
            .append_transaction(
                &mut tx,
                &NewTransaction {
                    kind: TransactionKind::BillPayment,
                    category: "Water".to_string(),
                    ..transfer_out(user_id, 50)
                },
            )
            .await
            .unwrap();
        store
            .append_transaction(
                &mut tx,
                &NewTransaction {
                    kind: TransactionKind::Received,
                    ..transfer_out(user_id, 900)
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let month = crate::db::current_month();
        assert_eq!(
            store.total_spent_in_month(user_id, &month).await.unwrap(),
            Decimal::from(200)
        );
        assert_eq!(
            store.total_received_in_month(user_id, &month).await.unwrap(),
            Decimal::from(900)
        );

        let by_category = store.spending_by_category(user_id, &month).await.unwrap();
        assert_eq!(
            by_category,
            vec![
                (CATEGORY_TRANSFER.to_string(), Decimal::from(150)),
                ("Water".to_string(), Decimal::from(50)),
            ]
        );
    }

    #[tokio::test]
    async fn empty_month_sums_to_zero() {
        let (store, user_id) = setup().await;
        assert_eq!(
            store.total_spent_in_month(user_id, "1999-01").await.unwrap(),
            Decimal::ZERO
        );
        assert!(store.spending_by_category(user_id, "1999-01").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn goals_create_list_update() {
        let (store, user_id) = setup().await;
        let goal = store
            .insert_goal(user_id, "New Bike", Decimal::from(12_000))
            .await
            .unwrap();
        assert_eq!(goal.current_amount, Decimal::ZERO);

        assert!(store
            .update_goal_amount(user_id, goal.id, Decimal::from(3_000))
            .await
            .unwrap());
        // Wrong owner must not be able to touch the goal.
        assert!(!store
            .update_goal_amount(user_id + 1, goal.id, Decimal::from(9_999))
            .await
            .unwrap());

        let goals = store.goals_for_user(user_id).await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].current_amount, Decimal::from(3_000));
        assert_eq!(goals[0].progress_percent(), 25);
    }
}
