//! Offset pagination over an arbitrary SELECT.

use crate::record::Record;
use serde::Serialize;

/// Links shown in the page window.
const WINDOW: u64 = 10;
/// Pages shown before the current one once the window starts sliding.
const WINDOW_LEAD: u64 = 5;

/// One page of results plus the numbers needed to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub total: u64,
    pub per_page: u64,
    pub last_page: u64,
    pub current_page: u64,
    /// 1-based position of the first row on this page.
    pub from: u64,
    /// 1-based position of the last row on this page.
    pub to: u64,
    pub page_start: u64,
    pub page_end: u64,
    pub data: Vec<Record>,
}

/// Page arithmetic, independent of the rows themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub current_page: u64,
    pub last_page: u64,
    pub offset: u64,
    pub from: u64,
    pub to: u64,
    pub page_start: u64,
    pub page_end: u64,
}

/// Largest page size PostgreSQL accepts as a `LIMIT`.
pub(crate) const MAX_PER_PAGE: u64 = i64::MAX as u64;

/// Offset of the requested page, before knowing the total.
pub(crate) fn offset(page: u64, per_page: u64) -> u64 {
    (page.max(1) - 1).saturating_mul(per_page)
}

/// `per_page` must be non-zero.
pub(crate) fn layout(total: u64, per_page: u64, page: u64) -> Layout {
    let last_page = total.div_ceil(per_page);
    let current_page = page.max(1).min(last_page.max(1));
    let offset = offset(current_page, per_page);
    let from = offset + 1;
    let to = from.saturating_add(per_page - 1).min(total);

    let mut page_start = 1;
    let mut page_end = WINDOW.min(last_page);
    if last_page > WINDOW && current_page > WINDOW_LEAD {
        page_start = current_page - WINDOW_LEAD;
        page_end = current_page + WINDOW - WINDOW_LEAD - 1;
        if page_end > last_page {
            let shift = page_end - last_page;
            page_start -= shift;
            page_end = last_page;
        }
    }

    Layout {
        current_page,
        last_page,
        offset,
        from,
        to,
        page_start,
        page_end,
    }
}

impl Page {
    pub(crate) fn new(total: u64, per_page: u64, layout: Layout, data: Vec<Record>) -> Self {
        Self {
            total,
            per_page,
            last_page: layout.last_page,
            current_page: layout.current_page,
            from: layout.from,
            to: layout.to,
            page_start: layout.page_start,
            page_end: layout.page_end,
            data,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overshooting_page_clamps_to_last() {
        let l = layout(95, 20, 8);
        assert_eq!(l.last_page, 5);
        assert_eq!(l.current_page, 5);
        assert_eq!(l.offset, 80);
        assert_eq!((l.from, l.to), (81, 95));
        assert_eq!((l.page_start, l.page_end), (1, 5));
    }

    #[test]
    fn first_page() {
        let l = layout(95, 20, 1);
        assert_eq!(l.offset, 0);
        assert_eq!((l.from, l.to), (1, 20));
    }

    #[test]
    fn page_zero_is_page_one() {
        assert_eq!(layout(95, 20, 0).current_page, 1);
        assert_eq!(offset(0, 20), 0);
    }

    #[test]
    fn empty_result() {
        let l = layout(0, 10, 3);
        assert_eq!(l.last_page, 0);
        assert_eq!(l.current_page, 1);
        assert_eq!((l.from, l.to), (1, 0));
        assert_eq!((l.page_start, l.page_end), (1, 0));
    }

    #[test]
    fn huge_page_size_does_not_overflow() {
        let l = layout(10, u64::MAX, 1);
        assert_eq!(l.last_page, 1);
        assert_eq!((l.from, l.to), (1, 10));

        let l = layout(10, MAX_PER_PAGE, 3);
        assert_eq!(l.current_page, 1);
        assert_eq!((l.offset, l.to), (0, 10));
    }

    #[test]
    fn window_slides_around_current_page() {
        let l = layout(1000, 10, 50);
        assert_eq!((l.page_start, l.page_end), (45, 54));

        let l = layout(1000, 10, 5);
        assert_eq!((l.page_start, l.page_end), (1, 10));

        let l = layout(1000, 10, 6);
        assert_eq!((l.page_start, l.page_end), (1, 10));
    }

    #[test]
    fn window_shifts_left_at_the_end() {
        let l = layout(1000, 10, 99);
        assert_eq!((l.page_start, l.page_end), (91, 100));
        let l = layout(1000, 10, 100);
        assert_eq!((l.page_start, l.page_end), (91, 100));
    }

    #[test]
    fn window_never_exceeds_bounds() {
        for total in [1, 9, 10, 11, 99, 101, 250] {
            for page in 1..=30 {
                let l = layout(total, 10, page);
                assert!(l.page_end <= l.last_page);
                assert!(l.page_end + 1 - l.page_start <= WINDOW);
                assert!(l.page_start >= 1);
                assert!((l.page_start..=l.page_end).contains(&l.current_page));
            }
        }
    }
}
