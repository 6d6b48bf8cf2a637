//! Keyset pagination over an ordered result set.

use harbour_types::LogRecord;

use crate::filter::Cursor;
use crate::store::SortOrder;

/// One page of records and the cursor for the next, if any.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<LogRecord>,
    pub next_cursor: Option<Cursor>,
}

/// Returns the first `page_size` records strictly after `cursor`.
///
/// `records` must already be sorted in `order`. A next cursor is only
/// produced for a full page; a short page means the sequence is exhausted.
pub fn paginate(
    records: Vec<LogRecord>,
    order: SortOrder,
    cursor: Option<&Cursor>,
    page_size: usize,
) -> Page {
    if page_size == 0 {
        return Page::default();
    }

    let page: Vec<LogRecord> = records
        .into_iter()
        .filter(|r| match cursor {
            Some(c) => order.is_past(r, c),
            None => true,
        })
        .take(page_size)
        .collect();

    let next_cursor = if page.len() == page_size {
        page.last().map(|last| Cursor {
            when: last.when,
            id: last.id.clone(),
        })
    } else {
        None
    };

    Page {
        records: page,
        next_cursor,
    }
}
