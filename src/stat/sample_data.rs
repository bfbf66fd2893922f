use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::datatype::{Customer, NewCustomer, NewTransaction, Transaction, UserId};
use super::ledger::Ledger;

/// Owner of the demo ledger.
pub const DEMO_USER: UserId = Uuid::from_u128(0x6b68_6174_6100_4000_8000_0000_0000_0001);

fn customer(page: i32, first: &str, last: &str, village: &str, created: DateTime<Utc>) -> Customer {
    Customer::new(
        DEMO_USER,
        NewCustomer {
            page_number: page,
            first_name: first.to_string(),
            last_name: last.to_string(),
            village: village.to_string(),
            notes: None,
        },
        created,
    )
}

fn entry(
    owner: &Customer,
    amount: i64,
    days_ago: i64,
    note: &str,
    now: DateTime<Utc>,
) -> Transaction {
    let at = now - Duration::days(days_ago);
    Transaction::new(
        DEMO_USER,
        owner.id,
        NewTransaction {
            amount: Decimal::from(amount),
            event_date: at.date_naive(),
            notes: (!note.is_empty()).then(|| note.to_string()),
        },
        at,
    )
}

/// A small ledger with dates relative to `now`, pending amounts already in sync.
pub fn demo_ledger(now: DateTime<Utc>) -> Ledger {
    let opened = now - Duration::days(120);
    let mut ramesh = customer(1, "Ramesh", "Patil", "Wadgaon", opened);
    ramesh.notes = Some("Pays after harvest".to_string());
    let sunita = customer(2, "Sunita", "Jadhav", "Wadgaon", opened);
    let anil = customer(3, "Anil", "Shinde", "Shirur", opened);
    let meena = customer(4, "Meena", "Kale", "Nandgaon", opened + Duration::days(30));
    let prakash = customer(5, "Prakash", "More", "Shirur", now - Duration::days(2));

    let transaction = vec![
        entry(&ramesh, 5_000, 60, "Seeds and fertiliser", now),
        entry(&ramesh, -2_000, 25, "Part payment", now),
        entry(&ramesh, 1_200, 3, "Pesticide", now),
        entry(&sunita, 850, 6, "Groceries", now),
        entry(&sunita, -850, 1, "Settled in cash", now),
        entry(&anil, 12_500, 45, "Tractor hire", now),
        entry(&anil, -4_000, 35, "", now),
        entry(&meena, 2_300, 14, "Cloth", now),
        entry(&meena, 0, 9, "Rate correction", now),
        entry(&meena, -500, 7, "UPI", now),
    ];

    let mut ledger = Ledger::new(vec![ramesh, sunita, anil, meena, prakash], transaction);
    ledger.refresh_pending();
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_ledger_is_consistent() {
        let ledger = demo_ledger(Utc::now());
        assert_eq!(ledger.customer.len(), 5);
        for c in &ledger.customer {
            assert_eq!(c.user_id, DEMO_USER);
            assert_eq!(ledger.pending_drift(c.id), None);
        }
        for t in &ledger.transaction {
            assert!(ledger.find_customer(t.customer_id).is_some());
            assert_eq!(t.amount.fract(), Decimal::ZERO);
        }
    }
}
