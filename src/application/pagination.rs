//! Page-number pagination over ordered record sets.

use serde::Deserialize;

/// Page size for every post listing.
pub const POSTS_PER_PAGE: u32 = 10;

/// Untrusted `?page=` value as it arrives on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

/// Requested page before it is checked against the record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(i64);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(1);

    /// Missing or non-integer input falls back to the first page.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<i64>().ok())
            .map(PageNumber)
            .unwrap_or(Self::FIRST)
    }

    pub fn new(value: i64) -> Self {
        PageNumber(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// LIMIT/OFFSET handed to a store query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

/// A requested page resolved against a known total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub per_page: u32,
}

impl PageWindow {
    /// Pages past the end, and pages below 1, resolve to the last page.
    /// An empty set still has one page.
    pub fn resolve(requested: PageNumber, total: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(u64::from(per_page)).max(1);
        let number = match u64::try_from(requested.get()) {
            Ok(number) if (1..=num_pages).contains(&number) => number,
            _ => num_pages,
        };

        Self {
            number,
            num_pages,
            total,
            per_page,
        }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest {
            limit: self.per_page,
            offset: (self.number - 1) * u64::from(self.per_page),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn from_window(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

/// Slices an already ordered vector with the same rules as [`PageWindow::resolve`].
pub fn paginate<T>(items: Vec<T>, requested: PageNumber, per_page: u32) -> Page<T> {
    let window = PageWindow::resolve(requested, items.len() as u64, per_page);
    let request = window.request();
    let skip = usize::try_from(request.offset).unwrap_or(usize::MAX);
    let items = items
        .into_iter()
        .skip(skip)
        .take(request.limit as usize)
        .collect();
    Page::from_window(items, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_to_first_page() {
        assert_eq!(PageNumber::parse(None), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("abc")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some("2.0")), PageNumber::FIRST);
        assert_eq!(PageNumber::parse(Some(" 3 ")), PageNumber::new(3));
        assert_eq!(PageNumber::parse(Some("-4")), PageNumber::new(-4));
    }

    #[test]
    fn out_of_range_resolves_to_last_page() {
        let window = PageWindow::resolve(PageNumber::new(99), 25, 10);
        assert_eq!(window.number, 3);
        assert_eq!(window.request(), PageRequest { limit: 10, offset: 20 });

        let window = PageWindow::resolve(PageNumber::new(0), 25, 10);
        assert_eq!(window.number, 3);
        let window = PageWindow::resolve(PageNumber::new(-1), 25, 10);
        assert_eq!(window.number, 3);
    }

    #[test]
    fn empty_set_has_one_empty_page() {
        let page = paginate(Vec::<u32>::new(), PageNumber::new(5), POSTS_PER_PAGE);
        assert!(page.items.is_empty());
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_other_pages());
    }

    #[test]
    fn pages_reconstruct_items_in_order() {
        for len in [0usize, 1, 9, 10, 11, 20, 37] {
            let items: Vec<usize> = (0..len).collect();
            let first = paginate(items.clone(), PageNumber::FIRST, POSTS_PER_PAGE);
            let mut seen = Vec::new();
            for number in 1..=first.num_pages {
                let page = paginate(items.clone(), PageNumber::new(number as i64), POSTS_PER_PAGE);
                assert!(page.items.len() <= POSTS_PER_PAGE as usize);
                seen.extend(page.items);
            }
            assert_eq!(seen, items, "length {len}");
        }
    }

    #[test]
    fn neighbours_follow_position() {
        let page = paginate((0..25).collect::<Vec<_>>(), PageNumber::new(2), 10);
        assert_eq!(page.previous_page_number(), Some(1));
        assert_eq!(page.next_page_number(), Some(3));

        let last = paginate((0..25).collect::<Vec<_>>(), PageNumber::new(3), 10);
        assert_eq!(last.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(last.next_page_number(), None);
    }
}
