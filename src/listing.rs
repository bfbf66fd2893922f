//! Search box and pagination state for the customer table.

use crate::stat::Customer;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    pub search: String,
    /// zero-based
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub items: Vec<&'a Customer>,
    pub page: usize,
    pub page_count: usize,
    pub total_matches: usize,
}

impl Page<'_> {
    /// 1-based "from–to" of the rows on this page, `None` when nothing matched.
    pub fn range(&self, page_size: usize) -> Option<(usize, usize)> {
        if self.items.is_empty() {
            return None;
        }
        let from = self.page * page_size + 1;
        Some((from, from + self.items.len() - 1))
    }
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CustomerQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.page = 0;
    }

    pub fn push_char(&mut self, c: char) {
        self.search.push(c);
        self.page = 0;
    }

    pub fn pop_char(&mut self) {
        self.search.pop();
        self.page = 0;
    }

    /// Case-insensitive match on names and village; a numeric needle also
    /// matches the ledger page number exactly.
    pub fn matches(&self, customer: &Customer) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        if let Ok(page) = needle.parse::<i32>() {
            if customer.page_number == page {
                return true;
            }
        }
        [
            customer.first_name.to_lowercase(),
            customer.last_name.to_lowercase(),
            customer.full_name().to_lowercase(),
            customer.village.to_lowercase(),
        ]
        .iter()
        .any(|field| field.contains(&needle))
    }

    pub fn page_count(&self, total_matches: usize) -> usize {
        total_matches.div_ceil(self.page_size).max(1)
    }

    pub fn apply<'a>(&self, customers: &'a [Customer]) -> Page<'a> {
        let matched: Vec<&Customer> = customers.iter().filter(|c| self.matches(c)).collect();
        let total_matches = matched.len();
        let page_count = self.page_count(total_matches);
        let page = self.page.min(page_count - 1);
        let items = matched
            .into_iter()
            .skip(page * self.page_size)
            .take(self.page_size)
            .collect();
        Page {
            items,
            page,
            page_count,
            total_matches,
        }
    }

    pub fn next_page(&mut self, total_matches: usize) {
        let last = self.page_count(total_matches) - 1;
        self.page = (self.page + 1).min(last);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }
}
