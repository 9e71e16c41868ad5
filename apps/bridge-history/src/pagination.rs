//! Search validation and page window rules.

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// `0x` plus 64 hex characters.
const TX_HASH_LEN: usize = 66;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// Empty means no filter.
    pub search_string: String,
    pub page_number: u32,
    pub page_size: u32,
}

impl PageParams {
    pub fn first(page_size: u32) -> Self {
        Self {
            search_string: String::new(),
            page_number: 0,
            page_size,
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page_number) * u64::from(self.page_size)
    }

    pub fn search(&self) -> Option<&str> {
        (!self.search_string.is_empty()).then_some(self.search_string.as_str())
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Trims the input and checks it is a full transaction hash. An empty input
/// clears the search.
pub fn validate_search(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let is_hash = trimmed.len() == TX_HASH_LEN
        && trimmed.starts_with("0x")
        && hex::decode(&trimmed[2..]).is_ok();

    if is_hash {
        Ok(trimmed.to_string())
    } else {
        Err(HistoryError::Validation(format!(
            "expected 0x followed by 64 hex characters, got {trimmed:?}"
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSearchPolicy {
    page_size: u32,
}

impl Default for PaginationSearchPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PaginationSearchPolicy {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn initial(&self) -> PageParams {
        PageParams::first(self.page_size)
    }

    /// Accepting a search restarts from the first page at the default size.
    /// A rejected search leaves the caller's params untouched.
    pub fn apply_search(&self, input: &str) -> Result<PageParams> {
        let search_string = validate_search(input)?;
        Ok(PageParams {
            search_string,
            page_number: 0,
            page_size: self.page_size,
        })
    }

    pub fn next_page_available(&self, params: &PageParams, last_page_len: usize) -> bool {
        last_page_len == params.page_size as usize
    }

    pub fn prev_page_available(&self, params: &PageParams) -> bool {
        params.page_number > 0
    }

    pub fn next(&self, params: &PageParams) -> PageParams {
        PageParams {
            page_number: params.page_number.saturating_add(1),
            ..params.clone()
        }
    }

    pub fn prev(&self, params: &PageParams) -> PageParams {
        PageParams {
            page_number: params.page_number.saturating_sub(1),
            ..params.clone()
        }
    }
}
