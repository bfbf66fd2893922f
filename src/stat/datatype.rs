use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type CustomerId = Uuid;
pub type TransactionId = Uuid;

/// One page of the physical ledger book: a customer and the cached sum of
/// their transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub user_id: UserId,
    pub page_number: i32,
    pub first_name: String,
    pub last_name: String,
    pub village: String,
    pub notes: Option<String>,
    /// Cached projection of the transaction sum, positive = owed to the business.
    pub pending_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(user_id: UserId, input: NewCustomer, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            page_number: input.page_number,
            first_name: input.first_name,
            last_name: input.last_name,
            village: input.village,
            notes: input.notes,
            pending_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn apply(&mut self, input: NewCustomer, now: DateTime<Utc>) {
        self.page_number = input.page_number;
        self.first_name = input.first_name;
        self.last_name = input.last_name;
        self.village = input.village;
        self.notes = input.notes;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    pub user_id: UserId,
    /// positive = credit (inflow), negative = debit (outflow)
    pub amount: Decimal,
    pub notes: Option<String>,
    pub event_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: UserId,
        customer_id: CustomerId,
        input: NewTransaction,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            user_id,
            amount: input.amount,
            notes: input.notes,
            event_date: input.event_date,
            created_at: now,
        }
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::of(self.amount)
    }

    pub fn apply(&mut self, input: NewTransaction) {
        self.amount = input.amount;
        self.event_date = input.event_date;
        self.notes = input.notes;
    }
}

/// Direction of a transaction. Zero amounts are reported as credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Credit,
    Debit,
}

impl EntryKind {
    pub fn of(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            EntryKind::Debit
        } else {
            EntryKind::Credit
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            EntryKind::Credit => EntryKind::Debit,
            EntryKind::Debit => EntryKind::Credit,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Credit => "Credit",
            EntryKind::Debit => "Debit",
        }
    }

    /// Applies this direction to a non-negative magnitude.
    pub fn signed(self, magnitude: Decimal) -> Decimal {
        match self {
            EntryKind::Credit => magnitude,
            EntryKind::Debit => -magnitude,
        }
    }
}

/// Validated customer fields, produced by [`crate::form::CustomerForm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub page_number: i32,
    pub first_name: String,
    pub last_name: String,
    pub village: String,
    pub notes: Option<String>,
}

/// Validated editable transaction fields, produced by [`crate::form::TransactionForm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: Decimal,
    pub event_date: NaiveDate,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn entry_kind_follows_sign() {
        assert_eq!(EntryKind::of(dec!(500)), EntryKind::Credit);
        assert_eq!(EntryKind::of(dec!(-200)), EntryKind::Debit);
        assert_eq!(EntryKind::of(Decimal::ZERO), EntryKind::Credit);
        assert_eq!(EntryKind::of(-Decimal::ZERO), EntryKind::Credit);
    }

    #[test]
    fn signed_applies_direction() {
        assert_eq!(EntryKind::Debit.signed(dec!(75)), dec!(-75));
        assert_eq!(EntryKind::Credit.signed(dec!(75)), dec!(75));
        assert_eq!(EntryKind::Credit.toggle(), EntryKind::Debit);
    }

    #[test]
    fn customer_apply_bumps_updated_at() {
        let created = Utc::now();
        let mut customer = Customer::new(
            Uuid::new_v4(),
            NewCustomer {
                page_number: 3,
                first_name: "Ramesh".into(),
                last_name: "Patil".into(),
                village: "Wadgaon".into(),
                notes: None,
            },
            created,
        );
        let later = created + chrono::Duration::minutes(5);
        customer.apply(
            NewCustomer {
                page_number: 4,
                first_name: "Ramesh".into(),
                last_name: "Patil".into(),
                village: "Shirur".into(),
                notes: Some("moved".into()),
            },
            later,
        );
        assert_eq!(customer.page_number, 4);
        assert_eq!(customer.village, "Shirur");
        assert_eq!(customer.created_at, created);
        assert_eq!(customer.updated_at, later);
        assert_eq!(customer.full_name(), "Ramesh Patil");
    }
}
