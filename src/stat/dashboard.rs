//! Fleet-wide metrics for the dashboard cards.
//!
//! Both windows are inclusive at their lower boundary and never reach past
//! `now`. Which timestamp of a transaction decides membership is picked by
//! [`WindowBasis`] and applies to both windows alike.

use super::datatype::{Customer, CustomerId, Transaction};
use super::ledger::{credit_total, debit_total};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub const LAST_WEEK_DAYS: i64 = 7;
pub const LAST_MONTH_DAYS: i64 = 30;

/// Which transaction timestamp drives the windowed metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowBasis {
    /// The user-supplied event date, compared as calendar dates in the time
    /// zone of `now`.
    #[default]
    EventDate,
    /// The system-assigned creation instant.
    CreatedAt,
}

impl FromStr for WindowBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" | "event_date" => Ok(WindowBasis::EventDate),
            "created" | "created_at" => Ok(WindowBasis::CreatedAt),
            other => Err(format!("unknown window basis `{other}` (expected event or created)")),
        }
    }
}

/// Windowed amounts are signed net sums; credit and debit are magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub last_week_amount: Decimal,
    pub last_month_amount: Decimal,
    pub total_customers: usize,
    pub active_customers: usize,
    pub credit_amount: Decimal,
    pub debit_amount: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Summarizer {
    basis: WindowBasis,
}

impl Summarizer {
    pub fn new(basis: WindowBasis) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> WindowBasis {
        self.basis
    }

    /// True when `transaction` falls in the trailing `days`-day window ending at `now`.
    pub fn within<Tz: TimeZone>(
        &self,
        transaction: &Transaction,
        now: &DateTime<Tz>,
        days: i64,
    ) -> bool {
        let start = now.clone() - Duration::days(days);
        match self.basis {
            WindowBasis::EventDate => {
                let first = start.date_naive();
                let last = now.date_naive();
                first <= transaction.event_date && transaction.event_date <= last
            }
            WindowBasis::CreatedAt => {
                let start = start.with_timezone(&Utc);
                let end = now.with_timezone(&Utc);
                start <= transaction.created_at && transaction.created_at <= end
            }
        }
    }

    pub fn window_amount<Tz: TimeZone>(
        &self,
        transactions: &[Transaction],
        now: &DateTime<Tz>,
        days: i64,
    ) -> Decimal {
        transactions
            .iter()
            .filter(|t| self.within(t, now, days))
            .map(|t| t.amount)
            .sum()
    }

    pub fn summarize<Tz: TimeZone>(
        &self,
        customers: &[Customer],
        transactions: &[Transaction],
        now: &DateTime<Tz>,
    ) -> DashboardMetrics {
        let known: HashSet<CustomerId> = customers.iter().map(|c| c.id).collect();
        let active: HashSet<CustomerId> = transactions
            .iter()
            .filter(|t| known.contains(&t.customer_id))
            .filter(|t| self.within(t, now, LAST_MONTH_DAYS))
            .map(|t| t.customer_id)
            .collect();

        DashboardMetrics {
            last_week_amount: self.window_amount(transactions, now, LAST_WEEK_DAYS),
            last_month_amount: self.window_amount(transactions, now, LAST_MONTH_DAYS),
            total_customers: customers.len(),
            active_customers: active.len(),
            credit_amount: credit_total(transactions),
            debit_amount: debit_total(transactions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn customer() -> Customer {
        let at = now() - Duration::days(400);
        Customer {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            page_number: 1,
            first_name: "Gopal".into(),
            last_name: "Rao".into(),
            village: "Kothur".into(),
            notes: None,
            pending_amount: Decimal::ZERO,
            created_at: at,
            updated_at: at,
        }
    }

    fn tx_days_ago(customer_id: CustomerId, amount: Decimal, days: i64) -> Transaction {
        let at = now() - Duration::days(days);
        Transaction {
            id: Uuid::new_v4(),
            customer_id,
            user_id: Uuid::nil(),
            amount,
            notes: None,
            event_date: at.date_naive(),
            created_at: at,
        }
    }

    #[test]
    fn parses_basis_names() {
        assert_eq!("event".parse::<WindowBasis>(), Ok(WindowBasis::EventDate));
        assert_eq!(" Created_At ".parse::<WindowBasis>(), Ok(WindowBasis::CreatedAt));
        assert!("yesterday".parse::<WindowBasis>().is_err());
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        let metrics = Summarizer::default().summarize(&[], &[], &now());
        assert_eq!(metrics, DashboardMetrics::default());
    }

    #[test]
    fn event_date_boundaries_are_inclusive() {
        let c = customer();
        let s = Summarizer::new(WindowBasis::EventDate);
        let at = |days| tx_days_ago(c.id, dec!(1), days);

        assert!(s.within(&at(0), &now(), LAST_WEEK_DAYS));
        assert!(s.within(&at(7), &now(), LAST_WEEK_DAYS));
        assert!(!s.within(&at(8), &now(), LAST_WEEK_DAYS));
        assert!(s.within(&at(30), &now(), LAST_MONTH_DAYS));
        assert!(!s.within(&at(31), &now(), LAST_MONTH_DAYS));
        assert!(!s.within(&at(-1), &now(), LAST_WEEK_DAYS));
    }

    #[test]
    fn event_date_ignores_creation_time() {
        let c = customer();
        let mut backdated = tx_days_ago(c.id, dec!(250), 3);
        backdated.created_at = now() - Duration::days(90);
        let mut entered_late = tx_days_ago(c.id, dec!(-80), 45);
        entered_late.created_at = now();

        let metrics = Summarizer::new(WindowBasis::EventDate).summarize(
            &[c.clone()],
            &[backdated.clone(), entered_late.clone()],
            &now(),
        );
        assert_eq!(metrics.last_week_amount, dec!(250));
        assert_eq!(metrics.last_month_amount, dec!(250));

        let metrics = Summarizer::new(WindowBasis::CreatedAt).summarize(
            &[c],
            &[backdated, entered_late],
            &now(),
        );
        assert_eq!(metrics.last_week_amount, dec!(-80));
        assert_eq!(metrics.last_month_amount, dec!(-80));
    }

    #[test]
    fn created_at_boundary_instant_counts() {
        let c = customer();
        let s = Summarizer::new(WindowBasis::CreatedAt);
        let mut edge = tx_days_ago(c.id, dec!(1), 7);
        assert!(s.within(&edge, &now(), LAST_WEEK_DAYS));
        edge.created_at -= Duration::seconds(1);
        assert!(!s.within(&edge, &now(), LAST_WEEK_DAYS));

        let mut edge = tx_days_ago(c.id, dec!(1), 30);
        assert!(s.within(&edge, &now(), LAST_MONTH_DAYS));
        edge.created_at -= Duration::milliseconds(1);
        assert!(!s.within(&edge, &now(), LAST_MONTH_DAYS));
    }

    #[test]
    fn active_counts_distinct_customers_in_month() {
        let recent = customer();
        let dormant = customer();
        let txs = vec![
            tx_days_ago(recent.id, dec!(500), 5),
            tx_days_ago(recent.id, dec!(-100), 12),
            tx_days_ago(dormant.id, dec!(300), 40),
        ];
        let metrics = Summarizer::default().summarize(&[recent, dormant], &txs, &now());
        assert_eq!(metrics.total_customers, 2);
        assert_eq!(metrics.active_customers, 1);
        assert_eq!(metrics.last_week_amount, dec!(500));
        assert_eq!(metrics.last_month_amount, dec!(400));
        assert_eq!(metrics.credit_amount, dec!(800));
        assert_eq!(metrics.debit_amount, dec!(100));
    }

    #[test]
    fn unknown_customers_never_become_active() {
        let known = customer();
        let txs = vec![tx_days_ago(Uuid::new_v4(), dec!(60), 1)];
        let metrics = Summarizer::default().summarize(&[known], &txs, &now());
        assert_eq!(metrics.active_customers, 0);
        assert_eq!(metrics.total_customers, 1);
        assert_eq!(metrics.last_week_amount, dec!(60));
    }

    #[test]
    fn calendar_date_is_taken_in_the_zone_of_now() {
        let c = customer();
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        // 20:00 UTC on the 19th is already the 20th in India.
        let late_evening = Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap();
        let mut t = tx_days_ago(c.id, dec!(1), 0);
        t.event_date = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();

        let s = Summarizer::new(WindowBasis::EventDate);
        assert!(s.within(&t, &late_evening, LAST_WEEK_DAYS));
        assert!(!s.within(&t, &late_evening.with_timezone(&ist), LAST_WEEK_DAYS));
    }

    #[test]
    fn summarizing_twice_is_identical() {
        let c = customer();
        let txs = vec![tx_days_ago(c.id, dec!(10), 2), tx_days_ago(c.id, dec!(-4), 20)];
        let customers = vec![c];
        let s = Summarizer::default();
        assert_eq!(
            s.summarize(&customers, &txs, &now()),
            s.summarize(&customers, &txs, &now())
        );
    }
}
