use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction as DbTransaction};

use super::LedgerStore;
use crate::error::{LedgerError, Result};
use crate::stat::{
    Customer, CustomerId, NewCustomer, NewTransaction, Transaction, TransactionId, UserId,
};

const CUSTOMER_COLUMNS: &str = "id, user_id, page_number, first_name, last_name, village, notes, \
     pending_amount, created_at, updated_at";
const TRANSACTION_COLUMNS: &str =
    "id, customer_id, user_id, amount, notes, event_date, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Opens a database transaction scoped to `user` for the row-level-security policies.
    async fn begin_as(&self, user: UserId) -> Result<DbTransaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
            .bind(user.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

/// Locks the customer row, then rewrites its pending amount from the
/// committed transaction sum plus this transaction's own changes.
///
/// `FOR NO KEY UPDATE` does not conflict with the `FOR KEY SHARE` lock the
/// foreign key check takes when a transaction row is inserted.
async fn settle(conn: &mut PgConnection, customer_id: CustomerId) -> Result<()> {
    sqlx::query("SELECT id FROM customers WHERE id = $1 FOR NO KEY UPDATE")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        UPDATE customers
        SET pending_amount = (
            SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE customer_id = $1
        )
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn map_missing_customer(e: sqlx::Error, customer: CustomerId) -> LedgerError {
    match &e {
        sqlx::Error::Database(db_err)
            if db_err.constraint() == Some("transactions_customer_id_fkey") =>
        {
            LedgerError::CustomerNotFound(customer)
        }
        _ => LedgerError::Database(e),
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn list_customers(&self, user: UserId) -> Result<Vec<Customer>> {
        let mut tx = self.begin_as(user).await?;
        let rows = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = $1 \
             ORDER BY page_number, created_at"
        ))
        .bind(user)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn list_transactions(
        &self,
        user: UserId,
        customer: Option<CustomerId>,
    ) -> Result<Vec<Transaction>> {
        let mut tx = self.begin_as(user).await?;
        let rows = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR customer_id = $2) \
             ORDER BY event_date DESC, created_at DESC"
        ))
        .bind(user)
        .bind(customer)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn create_customer(&self, user: UserId, input: NewCustomer) -> Result<Customer> {
        let mut tx = self.begin_as(user).await?;
        let row = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (user_id, page_number, first_name, last_name, village, notes) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(user)
        .bind(input.page_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.village)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::debug!(customer_id = %row.id, "customer created");
        Ok(row)
    }

    async fn update_customer(
        &self,
        user: UserId,
        id: CustomerId,
        input: NewCustomer,
    ) -> Result<Customer> {
        let mut tx = self.begin_as(user).await?;
        let row = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers \
             SET page_number = $3, first_name = $4, last_name = $5, village = $6, notes = $7 \
             WHERE id = $1 AND user_id = $2 RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(input.page_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.village)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::CustomerNotFound(id))?;
        tx.commit().await?;
        tracing::debug!(customer_id = %id, "customer updated");
        Ok(row)
    }

    async fn delete_customer(&self, user: UserId, id: CustomerId) -> Result<()> {
        let mut tx = self.begin_as(user).await?;
        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::CustomerNotFound(id));
        }
        tx.commit().await?;
        tracing::debug!(customer_id = %id, "customer deleted");
        Ok(())
    }

    async fn create_transaction(
        &self,
        user: UserId,
        customer: CustomerId,
        input: NewTransaction,
    ) -> Result<Transaction> {
        let mut tx = self.begin_as(user).await?;
        // Taken before the insert so writers to one customer queue up here.
        let owned = sqlx::query(
            "SELECT id FROM customers WHERE id = $1 AND user_id = $2 FOR NO KEY UPDATE",
        )
            .bind(customer)
            .bind(user)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Err(LedgerError::CustomerNotFound(customer));
        }
        let row = sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions (customer_id, user_id, amount, notes, event_date) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(customer)
        .bind(user)
        .bind(input.amount)
        .bind(&input.notes)
        .bind(input.event_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_missing_customer(e, customer))?;
        settle(&mut tx, customer).await?;
        tx.commit().await?;
        tracing::debug!(transaction_id = %row.id, customer_id = %customer, "transaction created");
        Ok(row)
    }

    async fn update_transaction(
        &self,
        user: UserId,
        id: TransactionId,
        input: NewTransaction,
    ) -> Result<Transaction> {
        let mut tx = self.begin_as(user).await?;
        let row = sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions SET amount = $3, event_date = $4, notes = $5 \
             WHERE id = $1 AND user_id = $2 RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(input.amount)
        .bind(input.event_date)
        .bind(&input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LedgerError::TransactionNotFound(id))?;
        settle(&mut tx, row.customer_id).await?;
        tx.commit().await?;
        tracing::debug!(transaction_id = %id, "transaction updated");
        Ok(row)
    }

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<()> {
        let mut tx = self.begin_as(user).await?;
        let customer: Option<CustomerId> = sqlx::query_scalar(
            "DELETE FROM transactions WHERE id = $1 AND user_id = $2 RETURNING customer_id",
        )
        .bind(id)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;
        let customer = customer.ok_or(LedgerError::TransactionNotFound(id))?;
        settle(&mut tx, customer).await?;
        tx.commit().await?;
        tracing::debug!(transaction_id = %id, "transaction deleted");
        Ok(())
    }
}
