use std::ops::Range;

/// Chunks shown between `--More--` prompts
pub const DEFAULT_PAGE_LEN: usize = 4;

/// What the reader wants after a page
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Cooperative paging over ordinals `start..total`.
///
/// The pager never blocks: the caller renders the range it hands out, asks the user
/// however it likes, and reports back through [`Pager::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    next: usize,
    total: usize,
    page_len: usize,
    stopped: bool,
}

impl Pager {
    /// `page_len == 0` hands out everything as a single page
    pub fn new(start: usize, total: usize, page_len: usize) -> Self {
        let page_len = if page_len == 0 { usize::MAX } else { page_len };
        Self { next: start.min(total), total, page_len, stopped: false }
    }

    pub fn next_page(&mut self) -> Option<Range<usize>> {
        if self.stopped || self.next >= self.total {
            return None;
        }
        let end = self.next.saturating_add(self.page_len).min(self.total);
        let page = self.next..end;
        self.next = end;
        Some(page)
    }

    /// Whether another page remains, i.e. whether to prompt at all
    pub fn has_more(&self) -> bool {
        !self.stopped && self.next < self.total
    }

    pub fn resume(&mut self, control: Control) {
        if control == Control::Stop {
            self.stopped = true;
        }
    }

    /// Ordinal of the next chunk to be shown
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
