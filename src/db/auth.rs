use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};

use super::ledger::map_account;
use super::models::Account;
use super::{now_for_db, StoreError};

/// Storage for account identity and credentials. Balance mutation lives in
/// the ledger store; this repository only ever writes the starting balance.
pub struct AuthRepository {
    pool: SqlitePool,
}

impl AuthRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        full_name: &str,
        phone: &str,
        account_no: &str,
        starting_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let created_at = now_for_db();
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, full_name, phone, account_no, balance, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(full_name)
        .bind(phone)
        .bind(account_no)
        .bind(starting_balance.to_string())
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Account {
            id: row.try_get("id")?,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            account_no: account_no.to_string(),
            balance: starting_balance,
            created_at,
        })
    }

    pub async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| map_account(&row)).transpose()
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn phone_exists(&self, phone: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT id FROM users WHERE phone = ?")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn account_count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO refresh_tokens (token, user_id, expires_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a refresh token to its account if it has not expired.
    /// Timestamps are the sortable DB format, so a plain string comparison
    /// against "now" is the expiry check.
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT u.* FROM users u
            INNER JOIN refresh_tokens rt ON rt.user_id = u.id
            WHERE rt.token = ? AND rt.expires_at > ?
            "#,
        )
        .bind(token)
        .bind(now_for_db())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| map_account(&row)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> AuthRepository {
        AuthRepository::new(crate::db::connect_test().await)
    }

    #[tokio::test]
    async fn create_and_find_account() {
        let repo = setup().await;
        let created = repo
            .create_account("ravi", "hash", "Ravi Kumar", "9123456789", "AC9876543210", Decimal::from(10_000))
            .await
            .unwrap();

        let found = repo.find_account_by_username("ravi").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.balance, Decimal::from(10_000));
        assert_eq!(found.account_no, "AC9876543210");

        assert!(repo.username_exists("ravi").await.unwrap());
        assert!(repo.phone_exists("9123456789").await.unwrap());
        assert!(!repo.username_exists("someone-else").await.unwrap());
        assert_eq!(repo.account_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_by_schema() {
        let repo = setup().await;
        repo.create_account("ravi", "hash", "Ravi Kumar", "9123456789", "AC1", Decimal::ZERO)
            .await
            .unwrap();
        let dup = repo
            .create_account("ravi", "hash", "Other", "9000000000", "AC2", Decimal::ZERO)
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn refresh_token_expiry_is_honoured() {
        let repo = setup().await;
        let account = repo
            .create_account("ravi", "hash", "Ravi Kumar", "9123456789", "AC1", Decimal::ZERO)
            .await
            .unwrap();

        repo.store_refresh_token(account.id, "live-token", "2999-01-01 00:00:00")
            .await
            .unwrap();
        repo.store_refresh_token(account.id, "dead-token", "2000-01-01 00:00:00")
            .await
            .unwrap();

        let live = repo.verify_refresh_token("live-token").await.unwrap();
        assert_eq!(live.unwrap().id, account.id);
        assert!(repo.verify_refresh_token("dead-token").await.unwrap().is_none());
        assert!(repo.verify_refresh_token("unknown").await.unwrap().is_none());
    }
}
