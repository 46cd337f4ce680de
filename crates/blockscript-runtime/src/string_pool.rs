//! Fixed-slot string pool
//!
//! Declaration names and argument names are copied into fixed-width slots so
//! a declaration never points at caller memory. Slots never grow: a string
//! that doesn't fit (including its terminator) is rejected up front.

use thiserror::Error;

/// Slot width in bytes, terminator included
pub const CHARS_PER_STRING: usize = 64;

/// Default number of slots allocated per page
pub const DEFAULT_SLOTS_PER_PAGE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StringPoolError {
    #[error("Cannot use strings longer than {max} characters for block script (got {len}: '{value}')")]
    TooLong { value: String, len: usize, max: usize },
}

/// Handle to a pooled string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PooledStr {
    page: u32,
    slot: u32,
    len: u8,
}

#[derive(Debug, Clone)]
pub struct StringPool {
    pages: Vec<Box<[u8]>>,
    slots_per_page: usize,
    used_in_last_page: usize,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS_PER_PAGE)
    }
}

impl StringPool {
    pub fn new(slots_per_page: usize) -> Self {
        Self {
            pages: Vec::new(),
            slots_per_page: slots_per_page.max(1),
            used_in_last_page: 0,
        }
    }

    /// Check that `value` fits in one slot
    pub fn test_string_length(value: &str) -> Result<(), StringPoolError> {
        if value.len() + 1 > CHARS_PER_STRING {
            return Err(StringPoolError::TooLong {
                value: value.to_string(),
                len: value.len(),
                max: CHARS_PER_STRING - 1,
            });
        }
        Ok(())
    }

    /// Copy `value` into a fresh slot
    pub fn allocate(&mut self, value: &str) -> Result<PooledStr, StringPoolError> {
        Self::test_string_length(value)?;

        if self.pages.is_empty() || self.used_in_last_page == self.slots_per_page {
            self.pages
                .push(vec![0u8; self.slots_per_page * CHARS_PER_STRING].into_boxed_slice());
            self.used_in_last_page = 0;
        }

        let page = self.pages.len() - 1;
        let slot = self.used_in_last_page;
        let start = slot * CHARS_PER_STRING;
        self.pages[page][start..start + value.len()].copy_from_slice(value.as_bytes());
        self.used_in_last_page += 1;

        Ok(PooledStr {
            page: page as u32,
            slot: slot as u32,
            len: value.len() as u8,
        })
    }

    /// Read back a pooled string
    pub fn get(&self, handle: PooledStr) -> &str {
        let start = handle.slot as usize * CHARS_PER_STRING;
        self.pages
            .get(handle.page as usize)
            .and_then(|page| page.get(start..start + handle.len as usize))
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .unwrap_or("")
    }

    /// Number of slots handed out
    pub fn len(&self) -> usize {
        match self.pages.len() {
            0 => 0,
            n => (n - 1) * self.slots_per_page + self.used_in_last_page,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
