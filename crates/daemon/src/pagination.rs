//! List pagination
//!
//! Page tokens are opaque UUIDs mapped to resume offsets. The cursor table is
//! bounded: tokens expire after a TTL and the oldest are evicted at capacity.

use crate::config::PaginationConfig;
use nvmeof_common::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

/// Effective window of a list request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub size: usize,
}

impl Window {
    /// Offset the page after this one starts at
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }
}

struct Cursor {
    offset: usize,
    issued_at: Instant,
}

/// Page-token table plus the page-size policy
pub struct Pagination {
    default_page_size: usize,
    max_page_size: usize,
    capacity: usize,
    ttl: Duration,
    cursors: Mutex<CursorTable>,
}

#[derive(Default)]
struct CursorTable {
    entries: HashMap<String, Cursor>,
    // Issue order; with a single TTL this is also expiry order
    order: VecDeque<String>,
}

impl Pagination {
    pub fn new(config: &PaginationConfig) -> Self {
        let max_page_size = config.max_page_size.max(1);
        Self {
            default_page_size: config.default_page_size.clamp(1, max_page_size),
            max_page_size,
            capacity: config.max_cursors.max(1),
            ttl: config.cursor_ttl(),
            cursors: Mutex::new(CursorTable::default()),
        }
    }

    /// Resolve the (offset, size) window for a page size and token
    pub fn extract(&self, page_size: i32, page_token: &str) -> Result<Window> {
        if page_size < 0 {
            return Err(Error::InvalidArgument(
                "negative PageSize is not allowed".to_string(),
            ));
        }

        let size = match page_size as usize {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        };

        if page_token.is_empty() {
            return Ok(Window { offset: 0, size });
        }

        let offset = self.lookup(page_token).ok_or_else(|| {
            Error::InvalidArgument(format!("unable to find pagination token {}", page_token))
        })?;

        Ok(Window { offset, size })
    }

    /// Mint a fresh token that resumes at `offset`
    pub fn issue(&self, offset: usize) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();

        let mut table = self.cursors.lock();
        table.purge_expired(now, self.ttl);
        while table.entries.len() >= self.capacity {
            match table.order.pop_front() {
                Some(oldest) => {
                    table.entries.remove(&oldest);
                }
                None => break,
            }
        }

        table.entries.insert(
            token.clone(),
            Cursor {
                offset,
                issued_at: now,
            },
        );
        table.order.push_back(token.clone());

        debug!("Issued page token {} at offset {}", token, offset);
        token
    }

    /// Slice one page out of `items`, minting a token when more remain
    pub fn paginate<T>(&self, items: Vec<T>, window: Window) -> (Vec<T>, String) {
        let (page, has_more) = limit(items, window);
        let token = if has_more {
            self.issue(window.next_offset())
        } else {
            String::new()
        };
        (page, token)
    }

    fn lookup(&self, token: &str) -> Option<usize> {
        let mut table = self.cursors.lock();
        table.purge_expired(Instant::now(), self.ttl);
        table.entries.get(token).map(|c| c.offset)
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        self.cursors.lock().entries.len()
    }
}

impl CursorTable {
    fn purge_expired(&mut self, now: Instant, ttl: Duration) {
        loop {
            let expired = match self.order.front() {
                Some(token) => self
                    .entries
                    .get(token)
                    .map_or(true, |c| now.duration_since(c.issued_at) >= ttl),
                None => break,
            };
            if !expired {
                break;
            }
            if let Some(token) = self.order.pop_front() {
                self.entries.remove(&token);
            }
        }
    }
}

/// Slice `items` to the window; reports whether elements remain past it
pub fn limit<T>(items: Vec<T>, window: Window) -> (Vec<T>, bool) {
    let len = items.len();
    let end = window.offset.saturating_add(window.size);
    let has_more = end < len;
    let page = items
        .into_iter()
        .skip(window.offset)
        .take(window.size)
        .collect();
    (page, has_more)
}
