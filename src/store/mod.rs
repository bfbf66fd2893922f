//! Storage collaborator.
//!
//! Every mutation of a customer's transaction set recomputes that customer's
//! stored pending amount inside the same operation, so the cached column
//! never lags the transaction sum. Concurrent writers resolve last-writer-wins.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::stat::{
    Customer, CustomerId, Ledger, NewCustomer, NewTransaction, Transaction, TransactionId, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Customers owned by `user`, by page number then creation time.
    async fn list_customers(&self, user: UserId) -> Result<Vec<Customer>>;

    /// Transactions owned by `user`, optionally of one customer, newest event first.
    async fn list_transactions(
        &self,
        user: UserId,
        customer: Option<CustomerId>,
    ) -> Result<Vec<Transaction>>;

    async fn create_customer(&self, user: UserId, input: NewCustomer) -> Result<Customer>;

    async fn update_customer(
        &self,
        user: UserId,
        id: CustomerId,
        input: NewCustomer,
    ) -> Result<Customer>;

    /// Removes the customer and all of its transactions.
    async fn delete_customer(&self, user: UserId, id: CustomerId) -> Result<()>;

    async fn create_transaction(
        &self,
        user: UserId,
        customer: CustomerId,
        input: NewTransaction,
    ) -> Result<Transaction>;

    async fn update_transaction(
        &self,
        user: UserId,
        id: TransactionId,
        input: NewTransaction,
    ) -> Result<Transaction>;

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<()>;

    async fn snapshot(&self, user: UserId) -> Result<Ledger> {
        let customer = self.list_customers(user).await?;
        let transaction = self.list_transactions(user, None).await?;
        Ok(Ledger::new(customer, transaction))
    }
}
