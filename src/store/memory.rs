use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;

use super::LedgerStore;
use crate::error::{LedgerError, Result};
use crate::stat::sample_data::demo_ledger;
use crate::stat::{
    Customer, CustomerId, Ledger, NewCustomer, NewTransaction, Transaction, TransactionId, UserId,
};

/// Keeps every user's rows in one [`Ledger`] behind a single lock. Backs the
/// demo mode, JSON snapshots and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the rows as given, bringing stored pending amounts in line first.
    pub fn from_ledger(mut ledger: Ledger) -> Self {
        let changed = ledger.refresh_pending();
        if changed > 0 {
            tracing::warn!(
                changed,
                "stored pending amounts did not match transactions, recomputed"
            );
        }
        Self {
            ledger: RwLock::new(ledger),
        }
    }

    pub fn demo(now: DateTime<Utc>) -> Self {
        Self::from_ledger(demo_ledger(now))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let ledger: Ledger = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %path.display(),
            customers = ledger.customer.len(),
            transactions = ledger.transaction.len(),
            "loaded ledger snapshot"
        );
        Ok(Self::from_ledger(ledger))
    }

    /// Writes to a temporary file next to `path` and renames it over the
    /// snapshot, so a failed save leaves the previous file untouched.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let ledger = self.ledger.read().await;
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &*ledger)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "saved ledger snapshot");
        Ok(())
    }
}

/// Recomputes the cached pending amount of one customer.
fn settle(ledger: &mut Ledger, customer_id: CustomerId, now: DateTime<Utc>) {
    let pending = ledger.pending_amount(customer_id);
    if let Some(c) = ledger.customer.iter_mut().find(|c| c.id == customer_id) {
        c.pending_amount = pending;
        c.updated_at = now;
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list_customers(&self, user: UserId) -> Result<Vec<Customer>> {
        let ledger = self.ledger.read().await;
        let mut rows: Vec<Customer> = ledger
            .customer
            .iter()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.page_number
                .cmp(&b.page_number)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    async fn list_transactions(
        &self,
        user: UserId,
        customer: Option<CustomerId>,
    ) -> Result<Vec<Transaction>> {
        let ledger = self.ledger.read().await;
        let mut rows: Vec<Transaction> = ledger
            .transaction
            .iter()
            .filter(|t| t.user_id == user)
            .filter(|t| customer.is_none_or(|id| t.customer_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.event_date
                .cmp(&a.event_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn create_customer(&self, user: UserId, input: NewCustomer) -> Result<Customer> {
        let customer = Customer::new(user, input, Utc::now());
        self.ledger.write().await.customer.push(customer.clone());
        tracing::debug!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    async fn update_customer(
        &self,
        user: UserId,
        id: CustomerId,
        input: NewCustomer,
    ) -> Result<Customer> {
        let mut ledger = self.ledger.write().await;
        let customer = ledger
            .customer
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user)
            .ok_or(LedgerError::CustomerNotFound(id))?;
        customer.apply(input, Utc::now());
        tracing::debug!(customer_id = %id, "customer updated");
        Ok(customer.clone())
    }

    async fn delete_customer(&self, user: UserId, id: CustomerId) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        let idx = ledger
            .customer
            .iter()
            .position(|c| c.id == id && c.user_id == user)
            .ok_or(LedgerError::CustomerNotFound(id))?;
        ledger.customer.remove(idx);
        let before = ledger.transaction.len();
        ledger.transaction.retain(|t| t.customer_id != id);
        tracing::debug!(
            customer_id = %id,
            transactions = before - ledger.transaction.len(),
            "customer deleted"
        );
        Ok(())
    }

    async fn create_transaction(
        &self,
        user: UserId,
        customer: CustomerId,
        input: NewTransaction,
    ) -> Result<Transaction> {
        let mut ledger = self.ledger.write().await;
        if !ledger
            .customer
            .iter()
            .any(|c| c.id == customer && c.user_id == user)
        {
            return Err(LedgerError::CustomerNotFound(customer));
        }
        let now = Utc::now();
        let transaction = Transaction::new(user, customer, input, now);
        ledger.transaction.push(transaction.clone());
        settle(&mut ledger, customer, now);
        tracing::debug!(
            transaction_id = %transaction.id,
            customer_id = %customer,
            "transaction created"
        );
        Ok(transaction)
    }

    async fn update_transaction(
        &self,
        user: UserId,
        id: TransactionId,
        input: NewTransaction,
    ) -> Result<Transaction> {
        let mut ledger = self.ledger.write().await;
        let transaction = ledger
            .transaction
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        transaction.apply(input);
        let updated = transaction.clone();
        settle(&mut ledger, updated.customer_id, Utc::now());
        tracing::debug!(transaction_id = %id, "transaction updated");
        Ok(updated)
    }

    async fn delete_transaction(&self, user: UserId, id: TransactionId) -> Result<()> {
        let mut ledger = self.ledger.write().await;
        let idx = ledger
            .transaction
            .iter()
            .position(|t| t.id == id && t.user_id == user)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let removed = ledger.transaction.remove(idx);
        settle(&mut ledger, removed.customer_id, Utc::now());
        tracing::debug!(transaction_id = %id, "transaction deleted");
        Ok(())
    }
}
