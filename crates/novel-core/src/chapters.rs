use regex::Regex;
use thiserror::Error;

use crate::types::{Chapter, ChapterKind};

/// Heading marker, 1-10 digits or CJK numerals, a unit, then a title on the
/// same line.
pub const DEFAULT_HEADING_PATTERN: &str =
    r"(?m)^第[\d\x{4e00}-\x{9fa5}]{1,10}[章回卷节][^\S\n]+.+$";

/// Leading or trailing untitled text longer than this many chars gets its own
/// synthetic chapter.
pub const SYNTHETIC_MIN_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid heading pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub heading_pattern: String,
    pub synthetic_min_chars: usize,
    pub preface_title: String,
    pub epilogue_title: String,
    pub full_text_title: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            heading_pattern: DEFAULT_HEADING_PATTERN.to_string(),
            synthetic_min_chars: SYNTHETIC_MIN_CHARS,
            preface_title: "Preface".to_string(),
            epilogue_title: "Epilogue".to_string(),
            full_text_title: "Full Text".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChapterIndexer {
    heading: Regex,
    config: IndexerConfig,
}

impl Default for ChapterIndexer {
    fn default() -> Self {
        let config = IndexerConfig::default();
        Self {
            heading: Regex::new(&config.heading_pattern).expect("default heading pattern compiles"),
            config,
        }
    }
}

impl ChapterIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self, IndexError> {
        let heading = Regex::new(&config.heading_pattern)?;
        Ok(Self { heading, config })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn index(&self, text: &str) -> Vec<Chapter> {
        if text.is_empty() {
            return Vec::new();
        }
        let headings: Vec<Chapter> = self
            .heading
            .find_iter(text)
            .map(|m| Chapter::new(m.as_str().trim(), ChapterKind::Heading, m.start(), m.end()))
            .collect();

        let (Some(first), Some(last)) = (headings.first(), headings.last()) else {
            return vec![Chapter::new(
                self.config.full_text_title.clone(),
                ChapterKind::FullText,
                0,
                text.len(),
            )];
        };

        let threshold = self.config.synthetic_min_chars;
        let mut chapters = Vec::with_capacity(headings.len() + 2);
        if exceeds_chars(&text[..first.start], threshold) {
            chapters.push(Chapter::new(
                self.config.preface_title.clone(),
                ChapterKind::Preface,
                0,
                first.start,
            ));
        }
        let last_end = last.end;
        chapters.extend(headings);
        if exceeds_chars(&text[last_end..], threshold) {
            chapters.push(Chapter::new(
                self.config.epilogue_title.clone(),
                ChapterKind::Epilogue,
                last_end,
                text.len(),
            ));
        }
        chapters
    }
}

fn exceeds_chars(s: &str, threshold: usize) -> bool {
    s.chars().nth(threshold).is_some()
}

/// Chapters a reader can jump to; synthetic preface and epilogue entries are
/// left out.
pub fn toc(chapters: &[Chapter]) -> Vec<(usize, &Chapter)> {
    chapters
        .iter()
        .enumerate()
        .filter(|(_, c)| !matches!(c.kind, ChapterKind::Preface | ChapterKind::Epilogue))
        .collect()
}

/// Body span of each chapter: from its start to the next chapter's start, the
/// last one running to `text_len`. The first body always starts at 0, so the
/// spans partition `[0, text_len)`.
pub fn chapter_bodies(chapters: &[Chapter], text_len: usize) -> Vec<(usize, usize)> {
    let mut bodies = Vec::with_capacity(chapters.len());
    for (idx, chapter) in chapters.iter().enumerate() {
        let start = if idx == 0 { 0 } else { chapter.start };
        let end = chapters
            .get(idx + 1)
            .map(|next| next.start)
            .unwrap_or(text_len);
        bodies.push((start, end.max(start)));
    }
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "字".repeat(n)
    }

    #[test]
    fn empty_text_has_no_chapters() {
        assert!(ChapterIndexer::default().index("").is_empty());
    }

    #[test]
    fn text_without_headings_is_one_chapter() {
        let text = "just some prose\nwithout headings\n";
        let chapters = ChapterIndexer::default().index(text);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].kind, ChapterKind::FullText);
        assert_eq!((chapters[0].start, chapters[0].end), (0, text.len()));
    }

    #[test]
    fn short_lead_and_tail_are_absorbed() {
        let text = format!(
            "第一章 开端\n{}\n第二章 旅程\n{}\n",
            filler(120),
            filler(40)
        );
        let chapters = ChapterIndexer::default().index(&text);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "第一章 开端");
        assert_eq!(chapters[0].start, 0);
        assert_eq!(&text[chapters[0].start..chapters[0].end], "第一章 开端");
        assert_eq!(chapters[1].title, "第二章 旅程");
        assert!(chapters.iter().all(|c| c.kind == ChapterKind::Heading));
    }

    #[test]
    fn long_lead_and_tail_become_synthetic_chapters() {
        let lead = filler(101);
        let text = format!(
            "{lead}\n第1回 起程\n正文\n第十二回 归来\n{}\n",
            filler(150)
        );
        let chapters = ChapterIndexer::default().index(&text);
        let kinds: Vec<ChapterKind> = chapters.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChapterKind::Preface,
                ChapterKind::Heading,
                ChapterKind::Heading,
                ChapterKind::Epilogue,
            ]
        );
        assert_eq!(chapters[0].end, chapters[1].start);
        assert_eq!(chapters[3].start, chapters[2].end);
        assert_eq!(chapters[3].end, text.len());
    }

    #[test]
    fn threshold_counts_chars_not_bytes() {
        // 100 chars (298 bytes) before the heading sit exactly at the threshold.
        let text = format!("{}\n第一章 开端\n", filler(99));
        let chapters = ChapterIndexer::default().index(&text);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].kind, ChapterKind::Heading);
    }

    #[test]
    fn heading_requires_line_start_and_title() {
        let text = "他说第一章 不算\n第二章\n第三卷 终\n";
        let chapters = ChapterIndexer::default().index(text);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "第三卷 终");
    }

    #[test]
    fn heading_does_not_swallow_next_line() {
        let text = "第一章 \n正文\n";
        let chapters = ChapterIndexer::default().index(text);
        assert_eq!(chapters[0].kind, ChapterKind::FullText);
    }

    #[test]
    fn numeral_run_is_capped() {
        let text = "第一二三四五六七八九十一章 太长\n";
        let chapters = ChapterIndexer::default().index(text);
        assert_eq!(chapters[0].kind, ChapterKind::FullText);
    }

    #[test]
    fn chapters_are_sorted_and_bodies_cover_text() {
        let text = format!(
            "{}\n第一章 甲\n{}\n第二章 乙\n{}\n第三章 丙\n{}\n",
            filler(130),
            filler(30),
            filler(300),
            filler(220)
        );
        let chapters = ChapterIndexer::default().index(&text);
        assert!(chapters.windows(2).all(|w| w[0].start < w[1].start));
        let bodies = chapter_bodies(&chapters, text.len());
        assert_eq!(bodies.first().map(|b| b.0), Some(0));
        assert_eq!(bodies.last().map(|b| b.1), Some(text.len()));
        assert!(bodies.windows(2).all(|w| w[0].1 == w[1].0));
    }

    #[test]
    fn toc_skips_preface_and_epilogue() {
        let text = format!("{}\n第一章 甲\n{}\n", filler(200), filler(200));
        let chapters = ChapterIndexer::default().index(&text);
        assert_eq!(chapters.len(), 3);
        let entries = toc(&chapters);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 1);
        assert_eq!(entries[0].1.title, "第一章 甲");
    }

    #[test]
    fn custom_pattern_and_titles() {
        let config = IndexerConfig {
            heading_pattern: r"(?m)^Chapter \d+.*$".to_string(),
            full_text_title: "全文".to_string(),
            ..IndexerConfig::default()
        };
        let indexer = ChapterIndexer::new(config).expect("pattern compiles");
        let chapters = indexer.index("Chapter 1 Start\nbody\nChapter 2\nmore\n");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].title, "Chapter 2");
        assert_eq!(indexer.index("nothing here")[0].title, "全文");
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let config = IndexerConfig {
            heading_pattern: "(unclosed".to_string(),
            ..IndexerConfig::default()
        };
        assert!(matches!(ChapterIndexer::new(config), Err(IndexError::Pattern(_))));
    }
}
