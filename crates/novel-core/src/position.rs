use crate::chapters::chapter_bodies;
use crate::types::{Chapter, Page};

/// Index of the page whose span contains `offset`. Pages are sorted and
/// disjoint, so this is a binary search.
pub fn find_page_for_offset(pages: &[Page], offset: usize) -> Option<usize> {
    let idx = pages.partition_point(|p| p.end <= offset);
    pages
        .get(idx)
        .filter(|p| p.contains(offset))
        .map(|_| idx)
}

/// Like [`find_page_for_offset`], falling back to the first page when the
/// offset is not on any page (for example stale chapter data after
/// re-pagination).
pub fn page_index_for_offset(pages: &[Page], offset: usize) -> usize {
    find_page_for_offset(pages, offset).unwrap_or(0)
}

pub fn page_for_chapter(pages: &[Page], chapter: &Chapter) -> usize {
    page_index_for_offset(pages, chapter.start)
}

/// Chapter whose body span holds `offset`.
pub fn chapter_index_for_offset(
    chapters: &[Chapter],
    text_len: usize,
    offset: usize,
) -> Option<usize> {
    let bodies = chapter_bodies(chapters, text_len);
    let idx = bodies.partition_point(|(_, end)| *end <= offset);
    bodies
        .get(idx)
        .filter(|(start, end)| *start <= offset && offset < *end)
        .map(|_| idx)
}
