use super::dashboard::{DashboardMetrics, Summarizer, WindowBasis};
use super::datatype::*;
use chrono::{DateTime, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sum of the positive amounts.
pub fn credit_total<'a, I>(transactions: I) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .map(|t| t.amount)
        .filter(|a| *a > Decimal::ZERO)
        .sum()
}

/// Sum of the magnitudes of the negative amounts.
pub fn debit_total<'a, I>(transactions: I) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .map(|t| t.amount)
        .filter(|a| *a < Decimal::ZERO)
        .map(|a| a.abs())
        .sum()
}

/// Signed sum of all amounts; the authoritative pending amount.
pub fn net_balance<'a, I>(transactions: I) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions.into_iter().map(|t| t.amount).sum()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub credit_total: Decimal,
    pub debit_total: Decimal,
    pub net_balance: Decimal,
    pub transaction_count: usize,
    pub last_event_date: Option<NaiveDate>,
}

impl LedgerSummary {
    pub fn of<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut summary = LedgerSummary::default();
        for t in transactions {
            if t.amount > Decimal::ZERO {
                summary.credit_total += t.amount;
            } else if t.amount < Decimal::ZERO {
                summary.debit_total += t.amount.abs();
            }
            summary.net_balance += t.amount;
            summary.transaction_count += 1;
            summary.last_event_date = summary.last_event_date.max(Some(t.event_date));
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub customer_id: CustomerId,
    pub page_number: i32,
    pub name: String,
    pub village: String,
    pub stored_pending: Decimal,
    pub summary: LedgerSummary,
}

impl CustomerSummary {
    pub fn has_drift(&self) -> bool {
        self.stored_pending != self.summary.net_balance
    }
}

/// Everything one user owns: their customers and all of their transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub customer: Vec<Customer>,
    pub transaction: Vec<Transaction>,
}

impl Ledger {
    pub fn new(customer: Vec<Customer>, transaction: Vec<Transaction>) -> Self {
        Self {
            customer,
            transaction,
        }
    }

    pub fn find_customer(&self, customer_id: CustomerId) -> Option<&Customer> {
        self.customer.iter().find(|c| c.id == customer_id)
    }

    /// Transactions of one customer, newest event first.
    pub fn transactions_of(&self, customer_id: CustomerId) -> Vec<&Transaction> {
        let mut rows: Vec<&Transaction> = self
            .transaction
            .iter()
            .filter(|t| t.customer_id == customer_id)
            .collect();
        rows.sort_by(|a, b| {
            b.event_date
                .cmp(&a.event_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        rows
    }

    pub fn pending_amount(&self, customer_id: CustomerId) -> Decimal {
        net_balance(
            self.transaction
                .iter()
                .filter(|t| t.customer_id == customer_id),
        )
    }

    /// `Some(stored - computed)` when the cached pending amount has drifted.
    pub fn pending_drift(&self, customer_id: CustomerId) -> Option<Decimal> {
        let stored = self.find_customer(customer_id)?.pending_amount;
        let drift = stored - self.pending_amount(customer_id);
        (!drift.is_zero()).then_some(drift)
    }

    /// Rewrites every cached pending amount from the transactions and returns
    /// how many customers changed.
    pub fn refresh_pending(&mut self) -> usize {
        let mut changed = 0;
        for i in 0..self.customer.len() {
            let id = self.customer[i].id;
            let computed = self.pending_amount(id);
            let customer = &mut self.customer[i];
            if customer.pending_amount != computed {
                tracing::debug!(
                    customer_id = %id,
                    stored = %customer.pending_amount,
                    computed = %computed,
                    "pending amount recomputed"
                );
                customer.pending_amount = computed;
                changed += 1;
            }
        }
        changed
    }

    pub fn customer_summary(&self, customer_id: CustomerId) -> Option<CustomerSummary> {
        let customer = self.find_customer(customer_id)?;
        Some(self.summarize(customer))
    }

    pub fn all_customer_summary(&self) -> Vec<CustomerSummary> {
        self.customer.iter().map(|c| self.summarize(c)).collect()
    }

    fn summarize(&self, customer: &Customer) -> CustomerSummary {
        CustomerSummary {
            customer_id: customer.id,
            page_number: customer.page_number,
            name: customer.full_name(),
            village: customer.village.clone(),
            stored_pending: customer.pending_amount,
            summary: LedgerSummary::of(
                self.transaction
                    .iter()
                    .filter(|t| t.customer_id == customer.id),
            ),
        }
    }

    pub fn dashboard<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        basis: WindowBasis,
    ) -> DashboardMetrics {
        Summarizer::new(basis).summarize(&self.customer, &self.transaction, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn tx(customer_id: CustomerId, amount: Decimal, event_date: NaiveDate) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            customer_id,
            user_id: Uuid::nil(),
            amount,
            notes: None,
            event_date,
            created_at: Utc::now(),
        }
    }

    fn customer(page_number: i32, pending_amount: Decimal) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            page_number,
            first_name: "Sita".into(),
            last_name: "Devi".into(),
            village: "Nandgaon".into(),
            notes: None,
            pending_amount,
            created_at: now,
            updated_at: now,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn totals_for_mixed_amounts() {
        let id = Uuid::new_v4();
        let rows = vec![
            tx(id, dec!(500), day(1)),
            tx(id, dec!(-200), day(2)),
            tx(id, dec!(100), day(3)),
        ];
        assert_eq!(credit_total(&rows), dec!(600));
        assert_eq!(debit_total(&rows), dec!(200));
        assert_eq!(net_balance(&rows), dec!(400));
    }

    #[test]
    fn empty_input_is_zero() {
        let rows: Vec<Transaction> = Vec::new();
        assert_eq!(credit_total(&rows), Decimal::ZERO);
        assert_eq!(debit_total(&rows), Decimal::ZERO);
        assert_eq!(net_balance(&rows), Decimal::ZERO);
        assert_eq!(LedgerSummary::of(&rows), LedgerSummary::default());
    }

    #[test]
    fn zero_amount_is_counted_but_not_totalled() {
        let id = Uuid::new_v4();
        let rows = vec![tx(id, Decimal::ZERO, day(4)), tx(id, dec!(-30), day(2))];
        let summary = LedgerSummary::of(&rows);
        assert_eq!(summary.credit_total, Decimal::ZERO);
        assert_eq!(summary.debit_total, dec!(30));
        assert_eq!(summary.net_balance, dec!(-30));
        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.last_event_date, Some(day(4)));
    }

    #[test]
    fn transactions_of_sorts_newest_event_first() {
        let c = customer(1, Decimal::ZERO);
        let other = Uuid::new_v4();
        let mut older = tx(c.id, dec!(10), day(5));
        older.created_at = Utc::now() - Duration::hours(1);
        let newer_same_day = tx(c.id, dec!(20), day(5));
        let ledger = Ledger::new(
            vec![c.clone()],
            vec![
                tx(c.id, dec!(1), day(1)),
                older,
                tx(other, dec!(99), day(9)),
                newer_same_day,
            ],
        );
        let amounts: Vec<Decimal> = ledger
            .transactions_of(c.id)
            .iter()
            .map(|t| t.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(20), dec!(10), dec!(1)]);
    }

    #[test]
    fn drift_is_detected_and_refreshed() {
        let stale = customer(1, dec!(100));
        let fresh = customer(2, dec!(-50));
        let ledger_rows = vec![
            tx(stale.id, dec!(300), day(1)),
            tx(stale.id, dec!(-150), day(2)),
            tx(fresh.id, dec!(-50), day(3)),
        ];
        let mut ledger = Ledger::new(vec![stale.clone(), fresh.clone()], ledger_rows);

        assert_eq!(ledger.pending_amount(stale.id), dec!(150));
        assert_eq!(ledger.pending_drift(stale.id), Some(dec!(-50)));
        assert_eq!(ledger.pending_drift(fresh.id), None);
        assert!(ledger.customer_summary(stale.id).unwrap().has_drift());

        assert_eq!(ledger.refresh_pending(), 1);
        assert_eq!(ledger.pending_drift(stale.id), None);
        assert_eq!(ledger.find_customer(stale.id).unwrap().pending_amount, dec!(150));
    }

    #[test]
    fn summaries_follow_customer_order() {
        let a = customer(7, Decimal::ZERO);
        let b = customer(2, Decimal::ZERO);
        let ledger = Ledger::new(vec![a.clone(), b.clone()], vec![tx(b.id, dec!(40), day(6))]);
        let all = ledger.all_customer_summary();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].page_number, 7);
        assert_eq!(all[0].summary.transaction_count, 0);
        assert_eq!(all[1].summary.net_balance, dec!(40));
        assert!(ledger.customer_summary(Uuid::new_v4()).is_none());
    }
}
