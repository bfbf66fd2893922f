use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Paragraph, Row, Table},
};
use tokio::runtime::Runtime;

use super::app::{App, InputMode, PendingDelete, Screen, TransactionTarget};
use crate::config::Config;
use crate::form::{CustomerForm, TransactionForm};
use crate::format::{date, inr, timestamp};
use crate::stat::{EntryKind, WindowBasis};
use crate::store::LedgerStore;

const TOP_PENDING: usize = 5;

pub fn run_tui(store: Arc<dyn LedgerStore>, config: &Config, rt: &Runtime) -> anyhow::Result<()> {
    let mut app = App::new(store, config.user_id, config.page_size, config.window_basis);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app, rt);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rt: &Runtime,
) -> anyhow::Result<()> {
    loop {
        if app.needs_refresh {
            app.needs_refresh = false;
            if let Err(e) = rt.block_on(app.refresh()) {
                tracing::debug!(error = %e, "refresh failed");
                app.report(Err(e));
            }
        }

        terminal.draw(|f| ui(f, app))?;

        if app.should_quit {
            return Ok(());
        }

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                handle_key_event(app, key, rt);
            }
        }
    }
}

fn handle_key_event(app: &mut App, key: KeyEvent, rt: &Runtime) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_key_normal(app, key, rt),
        InputMode::Searching => handle_key_search(app, key),
        InputMode::CustomerForm | InputMode::TransactionForm => handle_key_form(app, key, rt),
        InputMode::ConfirmDelete => handle_key_confirm(app, key, rt),
    }
}

fn handle_key_normal(app: &mut App, key: KeyEvent, rt: &Runtime) {
    use KeyCode::*;

    match key.code {
        Char('q') => app.should_quit = true,

        Tab => app.next_screen(),
        BackTab => app.prev_screen(),
        Char('?') => app.current_screen = Screen::Help,

        Up | Char('k') => app.move_up(),
        Down | Char('j') => app.move_down(),
        Left | PageUp if app.current_screen == Screen::Customers => app.prev_page(),
        Right | PageDown if app.current_screen == Screen::Customers => app.next_page(),

        Enter if app.current_screen == Screen::Customers => app.open_selected_customer(),
        Esc if app.current_screen == Screen::CustomerDetail => {
            app.current_screen = Screen::Customers
        }

        Char('/') => {
            app.current_screen = Screen::Customers;
            app.input_mode = InputMode::Searching;
        }

        Char('a') => app.start_new_customer(),
        Char('n') => app.start_new_transaction(),
        Char('e') => match app.current_screen {
            Screen::Customers => app.start_edit_customer(),
            Screen::CustomerDetail => app.start_edit_transaction(),
            _ => {}
        },
        Char('E') if app.current_screen == Screen::CustomerDetail => app.start_edit_customer(),
        Char('d') => app.start_delete(),

        Char('b') => app.toggle_basis(),
        Char('c') => app.clear_messages(),
        Char('r') => {
            let result = rt.block_on(app.refresh()).map(|_| "Data refreshed");
            app.report(result);
        }

        _ => {}
    }
}

fn handle_key_search(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => app.search_push(c),
        KeyCode::Backspace => app.search_pop(),
        KeyCode::Enter => app.input_mode = InputMode::Normal,
        KeyCode::Esc => {
            app.query.set_search("");
            app.selected_customer_idx = 0;
            app.input_mode = InputMode::Normal;
        }
        _ => {}
    }
}

fn handle_key_form(app: &mut App, key: KeyEvent, rt: &Runtime) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Tab | KeyCode::Down => app.next_field(),
        KeyCode::BackTab | KeyCode::Up => app.prev_field(),
        KeyCode::Backspace => app.form_backspace(),
        KeyCode::Char(c) => app.form_input(c),
        KeyCode::Enter => {
            let result = if app.input_mode == InputMode::CustomerForm {
                rt.block_on(app.submit_customer_form())
            } else {
                rt.block_on(app.submit_transaction_form())
            };
            app.report(result);
        }
        _ => {}
    }
}

fn handle_key_confirm(app: &mut App, key: KeyEvent, rt: &Runtime) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            let result = rt.block_on(app.confirm_delete());
            app.report(result);
        }
        KeyCode::Char('n') | KeyCode::Esc => app.cancel_input(),
        _ => {}
    }
}

fn selected_style() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

fn header_style() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn ui(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // main
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    let screen_name = match app.current_screen {
        Screen::Dashboard => "Dashboard",
        Screen::Customers => "Customers",
        Screen::CustomerDetail => "Customer",
        Screen::Help => "Help",
    };
    let basis = match app.basis {
        WindowBasis::EventDate => "event date",
        WindowBasis::CreatedAt => "entry time",
    };
    let header_text = format!(
        "Khata - {screen_name}   |   {} customers   |   windows by {basis}",
        app.ledger.customer.len()
    );
    let header = Paragraph::new(header_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    match app.input_mode {
        InputMode::CustomerForm => draw_customer_form(f, chunks[1], app),
        InputMode::TransactionForm => draw_transaction_form(f, chunks[1], app),
        _ => match app.current_screen {
            Screen::Dashboard => draw_dashboard(f, chunks[1], app),
            Screen::Customers => draw_customers(f, chunks[1], app),
            Screen::CustomerDetail => draw_customer_detail(f, chunks[1], app),
            Screen::Help => draw_help(f, chunks[1], app),
        },
    }

    draw_footer(f, chunks[2], app);
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &App) {
    let (text, style) = if app.input_mode == InputMode::ConfirmDelete {
        let what = match app.pending_delete {
            Some(PendingDelete::Customer(_)) => "this customer and all of their transactions",
            _ => "this transaction",
        };
        (format!("Delete {what}? y: yes  |  n/Esc: no"), Style::default().fg(Color::Yellow))
    } else if let Some(ref msg) = app.error_message {
        let dismiss = match app.input_mode {
            InputMode::CustomerForm | InputMode::TransactionForm => "Esc to cancel",
            _ => "Press 'c' to clear",
        };
        (format!("ERROR: {msg} | {dismiss}"), Style::default().fg(Color::Red))
    } else if let Some(ref msg) = app.success_message {
        (format!("{msg} | Press 'c' to clear"), Style::default().fg(Color::Green))
    } else {
        let hint = match app.input_mode {
            InputMode::Searching => "Searching: type to filter, Enter to keep, Esc to clear",
            InputMode::CustomerForm | InputMode::TransactionForm => {
                "Tab/↑/↓: switch field  |  Enter: save  |  Esc: cancel"
            }
            _ => match app.current_screen {
                Screen::Customers => {
                    concat!(
                        "↑/↓: move  |  ←/→: page  |  Enter: open  |  /: search  |  a: add  |  ",
                        "e: edit  |  n: new entry  |  d: delete  |  q: quit"
                    )
                }
                Screen::CustomerDetail => {
                    concat!(
                        "↑/↓: move  |  n: new entry  |  e: edit entry  |  E: edit customer  |  ",
                        "d: delete entry  |  Esc: back  |  q: quit"
                    )
                }
                _ => concat!(
                    "Tab/Shift+Tab: switch screen  |  a: add customer  |  b: window basis  |  ",
                    "r: refresh  |  ?: help  |  q: quit"
                ),
            },
        };
        (hint.to_string(), Style::default())
    };
    let footer =
        Paragraph::new(Span::styled(text, style)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn draw_dashboard(f: &mut Frame<'_>, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let m = &app.metrics;
    let text = format!(
        "Last 7 days:   {}\n\
         Last 30 days:  {}\n\
         Customers:     {} ({} active this month)\n\
         Credit given:  {}\n\
         Debit settled: {}\n\
         Outstanding:   {}",
        inr(m.last_week_amount),
        inr(m.last_month_amount),
        m.total_customers,
        m.active_customers,
        inr(m.credit_amount),
        inr(m.debit_amount),
        inr(m.credit_amount - m.debit_amount),
    );
    let p = Paragraph::new(text).block(Block::default().title("Summary").borders(Borders::ALL));
    f.render_widget(p, chunks[0]);

    let mut top = app.ledger.all_customer_summary();
    top.retain(|s| s.summary.net_balance > rust_decimal::Decimal::ZERO);
    top.sort_by(|a, b| b.summary.net_balance.cmp(&a.summary.net_balance));
    top.truncate(TOP_PENDING);

    let rows = top.iter().map(|s| {
        Row::new(vec![
            s.page_number.to_string(),
            s.name.clone(),
            s.village.clone(),
            inr(s.summary.net_balance),
            s.summary.last_event_date.map(date).unwrap_or_default(),
        ])
    });
    let widths = [
        Constraint::Length(6),
        Constraint::Length(24),
        Constraint::Length(16),
        Constraint::Length(14),
        Constraint::Length(12),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["Page", "Name", "Village", "Pending", "Last entry"])
                .style(header_style()),
        )
        .block(Block::default().title("Highest pending").borders(Borders::ALL));
    f.render_widget(table, chunks[1]);
}

fn draw_customers(f: &mut Frame<'_>, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let searching = app.input_mode == InputMode::Searching;
    let search_text = if searching {
        format!("{}_", app.query.search)
    } else {
        app.query.search.clone()
    };
    let search_style = if searching {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let search = Paragraph::new(Span::styled(search_text, search_style))
        .block(Block::default().title("Search (/)").borders(Borders::ALL));
    f.render_widget(search, chunks[0]);

    let page = app.customer_page();
    let rows = page.items.iter().enumerate().map(|(idx, c)| {
        let computed = app.ledger.pending_amount(c.id);
        let drift = if computed != c.pending_amount { " *" } else { "" };
        let mut row = Row::new(vec![
            c.page_number.to_string(),
            c.full_name(),
            c.village.clone(),
            format!("{}{drift}", inr(c.pending_amount)),
            app.ledger.transactions_of(c.id).len().to_string(),
        ]);
        if idx == app.selected_customer_idx {
            row = row.style(selected_style());
        }
        row
    });

    let title = match page.range(app.query.page_size) {
        Some((from, to)) => format!(
            "Customers {from}-{to} of {}  (page {}/{})",
            page.total_matches,
            page.page + 1,
            page.page_count
        ),
        None => "Customers (no matches)".to_string(),
    };
    let widths = [
        Constraint::Length(6),
        Constraint::Length(24),
        Constraint::Length(16),
        Constraint::Length(16),
        Constraint::Length(8),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["Page", "Name", "Village", "Pending", "Entries"]).style(header_style()),
        )
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(table, chunks[1]);
}

fn draw_customer_detail(f: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(summary) = app.detail_customer.and_then(|id| app.ledger.customer_summary(id)) else {
        let p = Paragraph::new("No customer selected. Open one from the Customers screen.")
            .block(Block::default().title("Customer").borders(Borders::ALL));
        f.render_widget(p, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    let notes = app
        .ledger
        .find_customer(summary.customer_id)
        .and_then(|c| c.notes.clone())
        .unwrap_or_default();
    let drift = if summary.has_drift() {
        format!("  (stored {})", inr(summary.stored_pending))
    } else {
        String::new()
    };
    let text = format!(
        "Page {} - {}, {}\n\
         Pending: {}{drift}\n\
         Credit {}  |  Debit {}  |  {} entries\n\
         {notes}",
        summary.page_number,
        summary.name,
        summary.village,
        inr(summary.summary.net_balance),
        inr(summary.summary.credit_total),
        inr(summary.summary.debit_total),
        summary.summary.transaction_count,
    );
    let p = Paragraph::new(text).block(Block::default().title("Customer").borders(Borders::ALL));
    f.render_widget(p, chunks[0]);

    let rows = app
        .detail_transactions()
        .into_iter()
        .enumerate()
        .map(|(idx, t)| {
            let kind = t.kind();
            let amount_style = match kind {
                EntryKind::Credit => Style::default(),
                EntryKind::Debit => Style::default().fg(Color::Green),
            };
            let mut row = Row::new(vec![
                date(t.event_date),
                kind.label().to_string(),
                inr(t.amount.abs()),
                t.notes.clone().unwrap_or_default(),
                timestamp(&t.created_at.with_timezone(&Local)),
            ])
            .style(amount_style);
            if idx == app.selected_transaction_idx {
                row = row.style(selected_style());
            }
            row
        });
    let widths = [
        Constraint::Length(12),
        Constraint::Length(7),
        Constraint::Length(14),
        Constraint::Min(16),
        Constraint::Length(19),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Date", "Kind", "Amount", "Notes", "Recorded"]).style(header_style()))
        .block(Block::default().title("Transactions").borders(Borders::ALL));
    f.render_widget(table, chunks[1]);
}

fn form_text<'a>(labels: &[&str], value: impl Fn(usize) -> &'a str, focused: usize) -> String {
    let mut text = String::new();
    for (idx, label) in labels.iter().enumerate() {
        let marker = if idx == focused { "> " } else { "  " };
        let cursor = if idx == focused { "_" } else { "" };
        text.push_str(&format!("{marker}{label}: {}{cursor}\n", value(idx)));
    }
    text
}

fn draw_customer_form(f: &mut Frame<'_>, area: Rect, app: &App) {
    let title = match app.customer_form_target {
        Some(_) => "Edit customer",
        None => "New customer",
    };
    let text = form_text(
        &CustomerForm::FIELDS,
        move |i| app.customer_form.field(i),
        app.form_field_idx,
    );
    let p = Paragraph::new(text).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_transaction_form(f: &mut Frame<'_>, area: Rect, app: &App) {
    let (title, customer_id) = match app.transaction_form_target {
        Some(TransactionTarget::Edit(id)) => (
            "Edit entry",
            app.ledger
                .transaction
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.customer_id),
        ),
        Some(TransactionTarget::Create(customer)) => ("New entry", Some(customer)),
        None => ("Entry", None),
    };
    let name = customer_id
        .and_then(|id| app.ledger.find_customer(id))
        .map(|c| c.full_name())
        .unwrap_or_default();

    let mut text = format!("Customer: {name}\n\n");
    text.push_str(&form_text(
        &TransactionForm::FIELDS,
        move |i| app.transaction_form.field(i),
        app.form_field_idx,
    ));
    text.push_str("\nKind: c = credit (given), d = debit (received), space toggles");
    let p = Paragraph::new(text).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_help(f: &mut Frame<'_>, area: Rect, _app: &App) {
    let text = "\
Screens:
  Dashboard  – last 7/30 days, customer counts, credit and debit totals
  Customers  – searchable, paged customer list with pending amounts
  Customer   – one customer's balance and entries
  Help       – this page

Key bindings:
  Tab / Shift+Tab : switch screen
  ↑ / ↓ (j / k)   : move selection
  ← / →           : previous / next page (Customers)
  Enter           : open customer
  /               : search by name, village or page number
  a               : add customer
  e               : edit customer (Customers) or entry (Customer)
  E               : edit customer (Customer)
  n               : new credit/debit entry
  d               : delete selected customer or entry
  b               : switch window basis (event date / entry time)
  r               : reload from storage
  c               : clear message
  ?               : open this help
  q               : quit

A credit is money given to the customer, a debit is money received back.
Pending is credit minus debit. Amounts marked * differ from the entries.
";

    let block = Block::default()
        .title(Span::raw("Help"))
        .borders(Borders::ALL);
    let p = Paragraph::new(text).block(block);
    f.render_widget(p, area);
}
