use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// PageError
///

#[derive(Debug, ThisError)]
pub enum PageError {
    #[error("page size must be at least 1")]
    ZeroSize,

    #[error("page size {size} exceeds the configured maximum of {max}")]
    SizeExceedsMax { size: u64, max: u64 },
}

///
/// PageRequest
///
/// Zero-based page number plus page size. The size bound is enforced by
/// the engine's configuration at execution time; construction only
/// rejects a zero size.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    number: u64,
    size: u64,
}

impl PageRequest {
    pub fn new(number: u64, size: u64) -> Result<Self, PageError> {
        if size == 0 {
            return Err(PageError::ZeroSize);
        }
        Ok(Self { number, size })
    }

    /// The first page with the given size.
    pub fn first(size: u64) -> Result<Self, PageError> {
        Self::new(0, size)
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Row offset of this page's first element.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.number * self.size
    }

    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }

    #[must_use]
    pub const fn previous(&self) -> Self {
        Self {
            number: self.number.saturating_sub(1),
            size: self.size,
        }
    }
}

///
/// Page
///
/// One page of results plus the filtered total. Everything else
/// (total pages, first/last, navigation) is derived so the fields can
/// never disagree with each other.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    content: Vec<T>,
    number: u64,
    size: u64,
    total_elements: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(content: Vec<T>, number: u64, size: u64, total_elements: u64) -> Self {
        Self {
            content,
            number,
            size,
            total_elements,
        }
    }

    #[must_use]
    pub fn content(&self) -> &[T] {
        &self.content
    }

    #[must_use]
    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn total_elements(&self) -> u64 {
        self.total_elements
    }

    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.total_elements == 0 {
            0
        } else {
            self.total_elements.div_ceil(self.size)
        }
    }

    #[must_use]
    pub fn number_of_elements(&self) -> u64 {
        self.content.len() as u64
    }

    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.number == 0
    }

    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.number + 1 >= self.total_pages() || self.total_pages() == 0
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.number + 1 < self.total_pages()
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.number > 0
    }

    /// Map the content, keeping the page geometry.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
        }
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.content.into_iter()
    }
}

///
/// Slice
///
/// A page without a total count. `has_next` comes from probing one row
/// past the page, so producing a slice never runs a count query.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Slice<T> {
    content: Vec<T>,
    number: u64,
    size: u64,
    has_next: bool,
}

impl<T> Slice<T> {
    #[must_use]
    pub const fn new(content: Vec<T>, number: u64, size: u64, has_next: bool) -> Self {
        Self {
            content,
            number,
            size,
            has_next,
        }
    }

    #[must_use]
    pub fn content(&self) -> &[T] {
        &self.content
    }

    #[must_use]
    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.has_next
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.number > 0
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            has_next: self.has_next,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_zero_size() {
        assert!(matches!(PageRequest::new(0, 0), Err(PageError::ZeroSize)));

        let request = PageRequest::new(2, 3).expect("request");
        assert_eq!(request.offset(), 6);
        assert_eq!(request.next().number(), 3);
        assert_eq!(request.previous().number(), 1);
        assert_eq!(PageRequest::first(3).expect("first").previous().number(), 0);
    }

    #[test]
    fn page_geometry_is_derived() {
        // 5 rows, size 3: two pages.
        let first: Page<u64> = Page::new(vec![1, 2, 3], 0, 3, 5);
        assert_eq!(first.total_pages(), 2);
        assert!(first.is_first());
        assert!(!first.is_last());
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last: Page<u64> = Page::new(vec![4, 5], 1, 3, 5);
        assert_eq!(last.number_of_elements(), 2);
        assert!(last.is_last());
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn empty_page_is_both_first_and_last() {
        let page: Page<u64> = Page::new(Vec::new(), 0, 10, 0);
        assert_eq!(page.total_pages(), 0);
        assert!(page.is_first());
        assert!(page.is_last());
        assert!(!page.has_next());
    }

    #[test]
    fn beyond_the_end_page_is_empty_but_keeps_the_total() {
        let page: Page<u64> = Page::new(Vec::new(), 7, 3, 5);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.total_pages(), 2);
        assert!(page.is_last());
        assert!(!page.has_next());
    }

    #[test]
    fn map_keeps_geometry() {
        let page: Page<u64> = Page::new(vec![1, 2], 1, 2, 4);
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.content(), ["1", "2"]);
        assert_eq!(mapped.number(), 1);
        assert_eq!(mapped.total_elements(), 4);
    }

    #[test]
    fn pages_serialize_as_plain_dtos() {
        let page: Page<u64> = Page::new(vec![1, 2], 0, 2, 5);
        let json = serde_json::to_value(&page).expect("json");

        assert_eq!(json["total_elements"], 5);
        assert_eq!(json["content"][1], 2);
    }

    #[test]
    fn slice_never_knows_a_total() {
        let slice: Slice<u64> = Slice::new(vec![1, 2, 3], 0, 3, true);
        assert!(slice.has_next());
        assert!(!slice.has_previous());
        assert_eq!(slice.map(|n| n * 2).into_content(), vec![2, 4, 6]);
    }
}
