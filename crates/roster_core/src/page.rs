//! Paging requests and results.
//!
//! # Responsibility
//! - Describe a zero-based page window with optional sort.
//! - Wrap a content window plus totals into `Page`, or into a count-free
//!   `Slice`.
//!
//! # Invariants
//! - `size > 0` for every constructed `PageRequest`.
//! - `Page::total_pages() == ceil(total_elements / size)`.
//! - `map` preserves all paging metadata.

use crate::query::sort::Sort;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequestError {
    ZeroPageSize,
}

impl Display for PageRequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroPageSize => write!(f, "page size must be greater than zero"),
        }
    }
}

impl Error for PageRequestError {}

/// Zero-based page index, page size and sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    pub fn of(page: u64, size: u64) -> Result<Self, PageRequestError> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u64, size: u64, sort: Sort) -> Result<Self, PageRequestError> {
        if size == 0 {
            return Err(PageRequestError::ZeroPageSize);
        }
        Ok(Self { page, size, sort })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }
}

/// One page of content plus the total element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    content: Vec<T>,
    number: u64,
    size: u64,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            number: request.page(),
            size: request.size(),
            total_elements,
        }
    }

    /// Builds a page, calling `count` only when the total cannot be derived
    /// from the window itself (a partial window means this is the last page).
    pub fn from_window<E, F>(content: Vec<T>, request: &PageRequest, count: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<u64, E>,
    {
        let len = content.len() as u64;
        let total = if len > 0 && len < request.size() {
            request.offset().saturating_add(len)
        } else if len == 0 && request.page() == 0 {
            0
        } else {
            count()?
        };
        Ok(Self::new(content, request, total))
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        self.total_elements.div_ceil(self.size)
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        self.number.saturating_add(1) < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

/// A page window without a total count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    content: Vec<T>,
    number: u64,
    size: u64,
    has_next: bool,
}

impl<T> Slice<T> {
    /// Builds a slice from a window fetched with `size + 1` rows; the extra
    /// row only signals that a next slice exists and is dropped.
    pub fn from_lookahead(mut content: Vec<T>, request: &PageRequest) -> Self {
        let size = usize::try_from(request.size()).unwrap_or(usize::MAX);
        let has_next = content.len() > size;
        content.truncate(size);
        Self {
            content,
            number: request.page(),
            size: request.size(),
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn is_first(&self) -> bool {
        self.number == 0
    }

    pub fn map<U, F>(self, f: F) -> Slice<U>
    where
        F: FnMut(T) -> U,
    {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            has_next: self.has_next,
        }
    }
}
