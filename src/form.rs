//! Write-boundary validation for the customer and transaction forms.
//!
//! Forms hold exactly what the user typed. `validate` is the only way to get
//! a [`NewCustomer`] / [`NewTransaction`], so stores never see malformed input.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::stat::{Customer, EntryKind, NewCustomer, NewTransaction, Transaction};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 1000;
/// `NUMERIC(14,2)` upper bound.
const MAX_AMOUNT_DIGITS: u32 = 12;
const MAX_AMOUNT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("page number must be a whole number of at least 1")]
    PageNumber,
    #[error("amount must be a number")]
    AmountFormat,
    #[error("amount must not be negative; pick debit instead")]
    NegativeAmount,
    #[error("amount can have at most two decimal places")]
    AmountScale,
    #[error("amount is too large")]
    AmountRange,
    #[error("date must look like YYYY-MM-DD")]
    Date,
}

fn required(field: &'static str, value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Required(field));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(FieldError::TooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(value.to_string())
}

fn optional_notes(value: &str) -> Result<Option<String>, FieldError> {
    let value = value.trim();
    if value.chars().count() > MAX_NOTES_LEN {
        return Err(FieldError::TooLong {
            field: "notes",
            max: MAX_NOTES_LEN,
        });
    }
    Ok((!value.is_empty()).then(|| value.to_string()))
}

pub fn parse_page_number(value: &str) -> Result<i32, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Required("page number"));
    }
    match value.parse::<i32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(FieldError::PageNumber),
    }
}

/// Drops digit-group commas, accepting both `1,234,567` and `12,34,567`.
/// Any other comma placement is rejected.
fn strip_group_separators(value: &str) -> Option<String> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if fraction.contains(',') {
        return None;
    }
    let digits = whole.trim_start_matches(['-', '+']);
    if digits.contains(',') {
        let groups: Vec<&str> = digits.split(',').collect();
        let last = groups.len() - 1;
        let grouped = groups.iter().enumerate().all(|(i, group)| {
            let len = group.len();
            let len_ok = match i {
                0 => (1..=3).contains(&len),
                i if i == last => len == 3,
                _ => len == 2 || len == 3,
            };
            len_ok && group.chars().all(|c| c.is_ascii_digit())
        });
        if !grouped {
            return None;
        }
    }
    Some(value.replace(',', ""))
}

/// Parses a non-negative magnitude such as `1,250.50`.
pub fn parse_amount(value: &str) -> Result<Decimal, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Required("amount"));
    }
    let cleaned = strip_group_separators(value).ok_or(FieldError::AmountFormat)?;
    let amount = Decimal::from_str(&cleaned).map_err(|_| FieldError::AmountFormat)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FieldError::NegativeAmount);
    }
    let amount = amount.normalize();
    if amount.scale() > MAX_AMOUNT_SCALE {
        return Err(FieldError::AmountScale);
    }
    if amount.trunc() >= Decimal::from(10_i64.pow(MAX_AMOUNT_DIGITS)) {
        return Err(FieldError::AmountRange);
    }
    Ok(amount.abs())
}

pub fn parse_date(value: &str) -> Result<NaiveDate, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::Required("date"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FieldError::Date)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerForm {
    pub page_number: String,
    pub first_name: String,
    pub last_name: String,
    pub village: String,
    pub notes: String,
}

impl CustomerForm {
    pub const FIELDS: [&'static str; 5] =
        ["Page number", "First name", "Last name", "Village", "Notes"];

    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            page_number: customer.page_number.to_string(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            village: customer.village.clone(),
            notes: customer.notes.clone().unwrap_or_default(),
        }
    }

    pub fn field_mut(&mut self, idx: usize) -> Option<&mut String> {
        match idx {
            0 => Some(&mut self.page_number),
            1 => Some(&mut self.first_name),
            2 => Some(&mut self.last_name),
            3 => Some(&mut self.village),
            4 => Some(&mut self.notes),
            _ => None,
        }
    }

    pub fn field(&self, idx: usize) -> &str {
        match idx {
            0 => &self.page_number,
            1 => &self.first_name,
            2 => &self.last_name,
            3 => &self.village,
            _ => &self.notes,
        }
    }

    pub fn validate(&self) -> Result<NewCustomer, FieldError> {
        Ok(NewCustomer {
            page_number: parse_page_number(&self.page_number)?,
            first_name: required("first name", &self.first_name)?,
            last_name: required("last name", &self.last_name)?,
            village: required("village", &self.village)?,
            notes: optional_notes(&self.notes)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionForm {
    pub kind: EntryKind,
    pub amount: String,
    pub event_date: String,
    pub notes: String,
}

impl TransactionForm {
    pub const FIELDS: [&'static str; 4] = ["Kind", "Amount", "Date (YYYY-MM-DD)", "Notes"];

    /// Blank credit entry dated `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            kind: EntryKind::Credit,
            amount: String::new(),
            event_date: today.format("%Y-%m-%d").to_string(),
            notes: String::new(),
        }
    }

    pub fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            kind: transaction.kind(),
            amount: transaction.amount.abs().normalize().to_string(),
            event_date: transaction.event_date.format("%Y-%m-%d").to_string(),
            notes: transaction.notes.clone().unwrap_or_default(),
        }
    }

    /// Text fields only; the kind is toggled, not typed.
    pub fn field_mut(&mut self, idx: usize) -> Option<&mut String> {
        match idx {
            1 => Some(&mut self.amount),
            2 => Some(&mut self.event_date),
            3 => Some(&mut self.notes),
            _ => None,
        }
    }

    pub fn field(&self, idx: usize) -> &str {
        match idx {
            0 => self.kind.label(),
            1 => &self.amount,
            2 => &self.event_date,
            _ => &self.notes,
        }
    }

    pub fn validate(&self) -> Result<NewTransaction, FieldError> {
        let magnitude = parse_amount(&self.amount)?;
        Ok(NewTransaction {
            amount: self.kind.signed(magnitude),
            event_date: parse_date(&self.event_date)?,
            notes: optional_notes(&self.notes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer_form() -> CustomerForm {
        CustomerForm {
            page_number: " 12 ".into(),
            first_name: " Lata ".into(),
            last_name: "Mane".into(),
            village: "Saswad".into(),
            notes: "   ".into(),
        }
    }

    #[test]
    fn valid_customer_is_trimmed() {
        let c = customer_form().validate().unwrap();
        assert_eq!(c.page_number, 12);
        assert_eq!(c.first_name, "Lata");
        assert_eq!(c.notes, None);
    }

    #[test]
    fn customer_rejections() {
        let mut f = customer_form();
        f.page_number = "0".into();
        assert_eq!(f.validate(), Err(FieldError::PageNumber));
        f.page_number = "4.5".into();
        assert_eq!(f.validate(), Err(FieldError::PageNumber));
        f.page_number = "".into();
        assert_eq!(f.validate(), Err(FieldError::Required("page number")));

        let mut f = customer_form();
        f.village = "  ".into();
        assert_eq!(f.validate(), Err(FieldError::Required("village")));

        let mut f = customer_form();
        f.last_name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            f.validate(),
            Err(FieldError::TooLong {
                field: "last name",
                max: MAX_NAME_LEN
            })
        );
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("1,250.50"), Ok(dec!(1250.5)));
        assert_eq!(parse_amount("0"), Ok(Decimal::ZERO));
        assert_eq!(parse_amount("12.00"), Ok(dec!(12)));
        assert_eq!(parse_amount(""), Err(FieldError::Required("amount")));
        assert_eq!(parse_amount("12abc"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount("-5"), Err(FieldError::NegativeAmount));
        assert_eq!(parse_amount("1.005"), Err(FieldError::AmountScale));
        assert_eq!(parse_amount("1000000000000"), Err(FieldError::AmountRange));
        assert_eq!(parse_amount("999999999999.99"), Ok(dec!(999999999999.99)));
    }

    #[test]
    fn commas_only_between_digit_groups() {
        assert_eq!(parse_amount("12,34,568"), Ok(dec!(1234568)));
        assert_eq!(parse_amount("1,234,567.25"), Ok(dec!(1234567.25)));
        assert_eq!(parse_amount("999"), Ok(dec!(999)));
        assert_eq!(parse_amount("1,,2,3"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount("12,3"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount(",123"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount("1234,567"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount("1.2,50"), Err(FieldError::AmountFormat));
        assert_eq!(parse_amount("-1,000"), Err(FieldError::NegativeAmount));
    }

    #[test]
    fn debit_kind_negates() {
        let form = TransactionForm {
            kind: EntryKind::Debit,
            amount: "200".into(),
            event_date: "2026-10-12".into(),
            notes: "paid back".into(),
        };
        let t = form.validate().unwrap();
        assert_eq!(t.amount, dec!(-200));
        assert_eq!(t.event_date, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(t.notes.as_deref(), Some("paid back"));
    }

    #[test]
    fn bad_date_is_rejected() {
        let mut form = TransactionForm::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(form.event_date, "2026-10-19");
        form.amount = "10".into();
        form.event_date = "19/10/2026".into();
        assert_eq!(form.validate(), Err(FieldError::Date));
    }

    #[test]
    fn edit_form_shows_magnitude() {
        let t = Transaction {
            id: uuid::Uuid::new_v4(),
            customer_id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::nil(),
            amount: dec!(-350.00),
            notes: None,
            event_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            created_at: chrono::Utc::now(),
        };
        let form = TransactionForm::from_transaction(&t);
        assert_eq!(form.kind, EntryKind::Debit);
        assert_eq!(form.amount, "350");
        assert_eq!(form.validate().unwrap().amount, dec!(-350));
    }
}
