use crate::errors::ConsoleError;

/// One outstanding page request. Carries the generation of the pager that
/// issued it so a completion arriving after a machine switch can be told
/// apart from a live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub hostname: String,
    pub page_index: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page accepted. `before_height` is the content height captured when the
    /// request was issued, consumed by the scroll anchor correction.
    Appended {
        before_height: usize,
        first_page: bool,
    },
    /// Transport failure. The same page index stays pending for retry.
    Failed(String),
    /// Completion from a superseded selection; state untouched.
    Stale,
}

/// Reverse pager for one machine selection.
///
/// Page 0 is the newest log chunk; each further fetch walks one page older.
/// At most one fetch is in flight at a time, `request_more` is safe to call
/// redundantly, and a failed fetch leaves `next_page_index` where it was so
/// the next trigger retries the same page.
#[derive(Debug)]
pub struct ReversePager {
    generation: u64,
    hostname: String,
    pages: Vec<Vec<String>>,
    next_page_index: usize,
    in_flight: bool,
    exhausted: bool,
    pending_before_height: usize,
}

impl ReversePager {
    pub fn new(generation: u64, hostname: impl Into<String>) -> Self {
        Self {
            generation,
            hostname: hostname.into(),
            pages: Vec::new(),
            next_page_index: 0,
            in_flight: false,
            exhausted: false,
            pending_before_height: 0,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn next_page_index(&self) -> usize {
        self.next_page_index
    }

    /// Ask for the next older page. No-op while a fetch is outstanding.
    ///
    /// An empty page marks the session exhausted; the trigger that observes
    /// the flag is declined and clears it, so history that grew upstream in
    /// the meantime is picked up by the trigger after that.
    pub fn request_more(&mut self, content_height: usize) -> Option<FetchTicket> {
        if self.in_flight {
            return None;
        }
        if self.exhausted {
            self.exhausted = false;
            return None;
        }
        self.in_flight = true;
        self.pending_before_height = content_height;
        Some(FetchTicket {
            generation: self.generation,
            hostname: self.hostname.clone(),
            page_index: self.next_page_index,
        })
    }

    /// Apply a fetch completion. Completions whose ticket belongs to another
    /// generation are discarded without touching any state.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<String>, ConsoleError>,
    ) -> PageOutcome {
        if ticket.generation != self.generation {
            return PageOutcome::Stale;
        }
        self.in_flight = false;
        match result {
            Ok(lines) => {
                if lines.is_empty() {
                    self.exhausted = true;
                }
                let first_page = self.pages.is_empty();
                self.pages.push(lines);
                self.next_page_index = ticket.page_index + 1;
                PageOutcome::Appended {
                    before_height: self.pending_before_height,
                    first_page,
                }
            }
            Err(error) => PageOutcome::Failed(error.to_string()),
        }
    }

    /// Total rendered rows across all fetched pages.
    pub fn line_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Lines in display order: pages in reverse fetch order (oldest fetched
    /// content at the top), lines within a page kept as delivered, so page 0
    /// content ends up at the bottom.
    pub fn merged_lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().rev().flatten().map(String::as_str)
    }
}
