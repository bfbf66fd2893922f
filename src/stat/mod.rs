pub mod dashboard;
pub mod datatype;
pub mod ledger;
pub mod sample_data;

pub use dashboard::{DashboardMetrics, Summarizer, WindowBasis};
pub use datatype::*;
pub use ledger::{CustomerSummary, Ledger, LedgerSummary, credit_total, debit_total, net_balance};
