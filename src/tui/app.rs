use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::error::LedgerError;
use crate::form::{CustomerForm, TransactionForm};
use crate::listing::{CustomerQuery, Page};
use crate::stat::{
    Customer, CustomerId, DashboardMetrics, EntryKind, Ledger, Transaction, TransactionId, UserId,
    WindowBasis,
};
use crate::store::LedgerStore;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Customers,
    CustomerDetail,
    Help,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Searching,
    CustomerForm,
    TransactionForm,
    ConfirmDelete,
}

/// What a submitted transaction form writes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionTarget {
    Create(CustomerId),
    Edit(TransactionId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PendingDelete {
    Customer(CustomerId),
    Transaction(TransactionId),
}

pub struct App {
    pub store: Arc<dyn LedgerStore>,
    pub user_id: UserId,
    pub basis: WindowBasis,
    pub ledger: Ledger,
    pub metrics: DashboardMetrics,
    pub current_screen: Screen,
    pub input_mode: InputMode,
    pub query: CustomerQuery,
    pub selected_customer_idx: usize,
    pub detail_customer: Option<CustomerId>,
    pub selected_transaction_idx: usize,
    pub customer_form: CustomerForm,
    /// `None` creates a new customer.
    pub customer_form_target: Option<CustomerId>,
    pub transaction_form: TransactionForm,
    pub transaction_form_target: Option<TransactionTarget>,
    pub form_field_idx: usize,
    pub pending_delete: Option<PendingDelete>,
    pub should_quit: bool,
    pub needs_refresh: bool,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl App {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        user_id: UserId,
        page_size: usize,
        basis: WindowBasis,
    ) -> Self {
        Self {
            store,
            user_id,
            basis,
            ledger: Ledger::default(),
            metrics: DashboardMetrics::default(),
            current_screen: Screen::Dashboard,
            input_mode: InputMode::Normal,
            query: CustomerQuery::new(page_size),
            selected_customer_idx: 0,
            detail_customer: None,
            selected_transaction_idx: 0,
            customer_form: CustomerForm::default(),
            customer_form_target: None,
            transaction_form: TransactionForm::new(today()),
            transaction_form_target: None,
            form_field_idx: 0,
            pending_delete: None,
            should_quit: false,
            needs_refresh: true,
            error_message: None,
            success_message: None,
        }
    }

    /// Reloads the snapshot and recomputes the dashboard metrics.
    pub async fn refresh(&mut self) -> Result<(), LedgerError> {
        self.ledger = self.store.snapshot(self.user_id).await?;
        self.metrics = self.ledger.dashboard(&Local::now(), self.basis);
        if let Some(id) = self.detail_customer {
            if self.ledger.find_customer(id).is_none() {
                self.detail_customer = None;
                if self.current_screen == Screen::CustomerDetail {
                    self.current_screen = Screen::Customers;
                }
            }
        }
        self.clamp_selection();
        Ok(())
    }

    /// Switches which timestamp drives the weekly and monthly windows.
    pub fn toggle_basis(&mut self) {
        self.basis = match self.basis {
            WindowBasis::EventDate => WindowBasis::CreatedAt,
            WindowBasis::CreatedAt => WindowBasis::EventDate,
        };
        self.metrics = self.ledger.dashboard(&Local::now(), self.basis);
    }

    pub fn report(&mut self, result: Result<&str, LedgerError>) {
        match result {
            Ok(msg) => {
                self.success_message = Some(msg.to_string());
                self.error_message = None;
            }
            Err(e) => {
                let hint = match self.input_mode {
                    _ if !e.is_retryable() => "",
                    InputMode::CustomerForm | InputMode::TransactionForm => {
                        " (press Enter to retry)"
                    }
                    _ => " (press r to retry)",
                };
                self.error_message = Some(format!("{e}{hint}"));
                self.success_message = None;
            }
        }
    }

    pub fn clear_messages(&mut self) {
        self.error_message = None;
        self.success_message = None;
    }

    pub fn next_screen(&mut self) {
        self.current_screen = match self.current_screen {
            Screen::Dashboard => Screen::Customers,
            Screen::Customers if self.detail_customer.is_some() => Screen::CustomerDetail,
            Screen::Customers => Screen::Help,
            Screen::CustomerDetail => Screen::Help,
            Screen::Help => Screen::Dashboard,
        };
    }

    pub fn prev_screen(&mut self) {
        self.current_screen = match self.current_screen {
            Screen::Dashboard => Screen::Help,
            Screen::Customers => Screen::Dashboard,
            Screen::CustomerDetail => Screen::Customers,
            Screen::Help if self.detail_customer.is_some() => Screen::CustomerDetail,
            Screen::Help => Screen::Customers,
        };
    }

    pub fn customer_page(&self) -> Page<'_> {
        self.query.apply(&self.ledger.customer)
    }

    pub fn selected_customer(&self) -> Option<&Customer> {
        self.customer_page()
            .items
            .get(self.selected_customer_idx)
            .copied()
    }

    pub fn detail_transactions(&self) -> Vec<&Transaction> {
        match self.detail_customer {
            Some(id) => self.ledger.transactions_of(id),
            None => Vec::new(),
        }
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.detail_transactions()
            .get(self.selected_transaction_idx)
            .copied()
    }

    fn clamp_selection(&mut self) {
        let rows = self.customer_page().items.len();
        self.selected_customer_idx = self.selected_customer_idx.min(rows.saturating_sub(1));
        let txs = self.detail_transactions().len();
        self.selected_transaction_idx = self.selected_transaction_idx.min(txs.saturating_sub(1));
    }

    pub fn move_up(&mut self) {
        match self.current_screen {
            Screen::Customers => {
                self.selected_customer_idx = self.selected_customer_idx.saturating_sub(1)
            }
            Screen::CustomerDetail => {
                self.selected_transaction_idx = self.selected_transaction_idx.saturating_sub(1)
            }
            _ => {}
        }
    }

    pub fn move_down(&mut self) {
        match self.current_screen {
            Screen::Customers => self.selected_customer_idx += 1,
            Screen::CustomerDetail => self.selected_transaction_idx += 1,
            _ => {}
        }
        self.clamp_selection();
    }

    pub fn next_page(&mut self) {
        let total = self.customer_page().total_matches;
        self.query.next_page(total);
        self.selected_customer_idx = 0;
    }

    pub fn prev_page(&mut self) {
        self.query.prev_page();
        self.selected_customer_idx = 0;
    }

    pub fn search_push(&mut self, c: char) {
        self.query.push_char(c);
        self.selected_customer_idx = 0;
    }

    pub fn search_pop(&mut self) {
        self.query.pop_char();
        self.selected_customer_idx = 0;
    }

    pub fn open_selected_customer(&mut self) {
        if let Some(id) = self.selected_customer().map(|c| c.id) {
            self.detail_customer = Some(id);
            self.selected_transaction_idx = 0;
            self.current_screen = Screen::CustomerDetail;
        }
    }

    pub fn start_new_customer(&mut self) {
        let next_page = self
            .ledger
            .customer
            .iter()
            .map(|c| c.page_number)
            .max()
            .unwrap_or(0)
            + 1;
        self.customer_form = CustomerForm {
            page_number: next_page.to_string(),
            ..CustomerForm::default()
        };
        self.customer_form_target = None;
        self.form_field_idx = 0;
        self.input_mode = InputMode::CustomerForm;
    }

    pub fn start_edit_customer(&mut self) {
        let customer = match self.current_screen {
            Screen::CustomerDetail => self
                .detail_customer
                .and_then(|id| self.ledger.find_customer(id)),
            _ => self.selected_customer(),
        };
        let Some((form, id)) = customer.map(|c| (CustomerForm::from_customer(c), c.id)) else {
            return;
        };
        self.customer_form = form;
        self.customer_form_target = Some(id);
        self.form_field_idx = 0;
        self.input_mode = InputMode::CustomerForm;
    }

    /// New transaction for the customer on screen (detail) or selected (list).
    pub fn start_new_transaction(&mut self) {
        let customer = match self.current_screen {
            Screen::CustomerDetail => self.detail_customer,
            Screen::Customers => self.selected_customer().map(|c| c.id),
            _ => None,
        };
        let Some(customer) = customer else {
            self.error_message = Some("Select a customer first".to_string());
            return;
        };
        self.transaction_form = TransactionForm::new(today());
        self.transaction_form_target = Some(TransactionTarget::Create(customer));
        self.form_field_idx = 1;
        self.input_mode = InputMode::TransactionForm;
    }

    pub fn start_edit_transaction(&mut self) {
        let Some((form, id)) = self
            .selected_transaction()
            .map(|t| (TransactionForm::from_transaction(t), t.id))
        else {
            return;
        };
        self.transaction_form = form;
        self.transaction_form_target = Some(TransactionTarget::Edit(id));
        self.form_field_idx = 1;
        self.input_mode = InputMode::TransactionForm;
    }

    pub fn start_delete(&mut self) {
        self.pending_delete = match self.current_screen {
            Screen::Customers => self.selected_customer().map(|c| PendingDelete::Customer(c.id)),
            Screen::CustomerDetail => self
                .selected_transaction()
                .map(|t| PendingDelete::Transaction(t.id)),
            _ => None,
        };
        if self.pending_delete.is_some() {
            self.input_mode = InputMode::ConfirmDelete;
        }
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.pending_delete = None;
        self.error_message = None;
    }

    pub fn form_field_count(&self) -> usize {
        match self.input_mode {
            InputMode::CustomerForm => CustomerForm::FIELDS.len(),
            InputMode::TransactionForm => TransactionForm::FIELDS.len(),
            _ => 0,
        }
    }

    pub fn next_field(&mut self) {
        let n = self.form_field_count();
        if n > 0 {
            self.form_field_idx = (self.form_field_idx + 1) % n;
        }
    }

    pub fn prev_field(&mut self) {
        let n = self.form_field_count();
        if n > 0 {
            self.form_field_idx = (self.form_field_idx + n - 1) % n;
        }
    }

    pub fn form_input(&mut self, c: char) {
        match self.input_mode {
            InputMode::CustomerForm => {
                if let Some(field) = self.customer_form.field_mut(self.form_field_idx) {
                    field.push(c);
                }
            }
            InputMode::TransactionForm => {
                if self.form_field_idx == 0 {
                    self.transaction_form.kind = match c {
                        'c' | 'C' => EntryKind::Credit,
                        'd' | 'D' => EntryKind::Debit,
                        ' ' => self.transaction_form.kind.toggle(),
                        _ => self.transaction_form.kind,
                    };
                } else if let Some(field) = self.transaction_form.field_mut(self.form_field_idx) {
                    field.push(c);
                }
            }
            _ => {}
        }
    }

    pub fn form_backspace(&mut self) {
        let field = match self.input_mode {
            InputMode::CustomerForm => self.customer_form.field_mut(self.form_field_idx),
            InputMode::TransactionForm => self.transaction_form.field_mut(self.form_field_idx),
            _ => None,
        };
        if let Some(field) = field {
            field.pop();
        }
    }

    pub async fn submit_customer_form(&mut self) -> Result<&'static str, LedgerError> {
        let input = self.customer_form.validate()?;
        let msg = match self.customer_form_target {
            Some(id) => {
                self.store.update_customer(self.user_id, id, input).await?;
                "Customer updated"
            }
            None => {
                self.store.create_customer(self.user_id, input).await?;
                "Customer created"
            }
        };
        self.input_mode = InputMode::Normal;
        self.refresh().await?;
        Ok(msg)
    }

    pub async fn submit_transaction_form(&mut self) -> Result<&'static str, LedgerError> {
        let input = self.transaction_form.validate()?;
        let msg = match self.transaction_form_target {
            Some(TransactionTarget::Create(customer)) => {
                self.store
                    .create_transaction(self.user_id, customer, input)
                    .await?;
                "Transaction recorded"
            }
            Some(TransactionTarget::Edit(id)) => {
                self.store.update_transaction(self.user_id, id, input).await?;
                "Transaction updated"
            }
            None => return Ok("Nothing to save"),
        };
        self.input_mode = InputMode::Normal;
        self.refresh().await?;
        Ok(msg)
    }

    pub async fn confirm_delete(&mut self) -> Result<&'static str, LedgerError> {
        let Some(target) = self.pending_delete.take() else {
            self.input_mode = InputMode::Normal;
            return Ok("Nothing to delete");
        };
        self.input_mode = InputMode::Normal;
        let msg = match target {
            PendingDelete::Customer(id) => {
                self.store.delete_customer(self.user_id, id).await?;
                "Customer and all transactions deleted"
            }
            PendingDelete::Transaction(id) => {
                self.store.delete_transaction(self.user_id, id).await?;
                "Transaction deleted"
            }
        };
        self.refresh().await?;
        Ok(msg)
    }
}
