//! Pagination policy for the v4 collection endpoints.

/// Pure page-walking state. The engine asks for the next page number,
/// fetches it, then reports how many records came back; the paginator
/// decides whether another request is warranted.
///
/// A page shorter than `page_size` (including an empty page) is the last
/// one, so the walk always terminates once the upstream collection is
/// exhausted.
#[derive(Clone, Debug)]
pub struct Paginator {
    page_size: u32,
    next: u32,
    done: bool,
}

impl Paginator {
    pub fn new(page_size: u32) -> Self {
        Self { page_size, next: 1, done: false }
    }

    /// Page number to request next, or `None` when the walk is finished.
    pub fn next_page(&self) -> Option<u32> {
        if self.done {
            None
        } else {
            Some(self.next)
        }
    }

    /// Record the size of the page just fetched.
    pub fn advance(&mut self, fetched: usize) {
        if fetched < self.page_size as usize {
            self.done = true;
        } else {
            self.next += 1;
        }
    }
}
