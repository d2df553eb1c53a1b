//! Byte-capped result pages

/// Largest page body accepted by the publishing service
pub const PAGE_BYTE_LIMIT: usize = 39_000;

/// Accumulates rendered results and seals a page once it grows past the limit
#[derive(Debug)]
pub struct PageBuffer {
    limit: usize,
    current: String,
    pages: Vec<String>,
    count: usize,
}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::with_limit(PAGE_BYTE_LIMIT)
    }
}

impl PageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            current: String::new(),
            pages: Vec::new(),
            count: 0,
        }
    }

    /// Append markup that is not an entry (titles, headers)
    pub fn push_str(&mut self, text: &str) {
        self.current.push_str(text);
    }

    /// Append one rendered entry; the page is sealed after the entry
    /// that crosses the limit
    pub fn push_entry(&mut self, entry: &str) {
        self.current.push_str(entry);
        self.count += 1;
        if self.current.len() > self.limit {
            self.pages.push(std::mem::take(&mut self.current));
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn finish(mut self) -> SearchResults {
        if !self.current.is_empty() {
            self.pages.push(self.current);
        }
        SearchResults {
            pages: self.pages,
            count: self.count,
        }
    }
}

/// Output of one search: ordered pages and the number of matched entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub pages: Vec<String>,
    pub count: usize,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
