#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use khata::stat::{Customer, Ledger, NewCustomer, NewTransaction, Transaction, UserId};

pub const OWNER: UserId = Uuid::from_u128(0x1000);

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn customer(page: i32, first: &str, village: &str) -> Customer {
    Customer::new(
        OWNER,
        NewCustomer {
            page_number: page,
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            village: village.to_string(),
            notes: None,
        },
        now() - Duration::days(365),
    )
}

/// Entry whose event date and creation instant are both `at`.
pub fn entry_at(owner: &Customer, amount: i64, at: DateTime<Utc>) -> Transaction {
    Transaction::new(
        OWNER,
        owner.id,
        NewTransaction {
            amount: Decimal::from(amount),
            event_date: at.date_naive(),
            notes: None,
        },
        at,
    )
}

pub fn entry(owner: &Customer, amount: i64, days_ago: i64) -> Transaction {
    entry_at(owner, amount, now() - Duration::days(days_ago))
}

pub fn ledger(customers: Vec<Customer>, transactions: Vec<Transaction>) -> Ledger {
    let mut ledger = Ledger::new(customers, transactions);
    ledger.refresh_pending();
    ledger
}
