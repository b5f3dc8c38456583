use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;
use tracing::{debug, warn};

/// Charset used when detection is inconclusive.
pub const FALLBACK_CHARSET: &str = "GBK";

#[derive(Debug, Error)]
pub enum TextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown charset: {0}")]
    UnknownCharset(String),
}

/// Encoding-detection oracle: returns a charset label, or `None` when the
/// bytes do not identify one.
pub trait CharsetDetector {
    fn detect(&self, bytes: &[u8]) -> Option<String>;
}

/// Recognizes byte-order marks and valid UTF-8; anything else is
/// inconclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct BomSniffer;

impl CharsetDetector for BomSniffer {
    fn detect(&self, bytes: &[u8]) -> Option<String> {
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return Some(encoding.name().to_string());
        }
        if bytes.is_empty() {
            return None;
        }
        std::str::from_utf8(bytes)
            .ok()
            .map(|_| UTF_8.name().to_string())
    }
}

/// Statistical detection via `chardetng`, after the [`BomSniffer`] fast path.
/// Any non-empty input yields a guess.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingSniffer;

impl CharsetDetector for EncodingSniffer {
    fn detect(&self, bytes: &[u8]) -> Option<String> {
        if let Some(label) = BomSniffer.detect(bytes) {
            return Some(label);
        }
        if bytes.is_empty() {
            return None;
        }
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        Some(detector.guess(None, true).name().to_string())
    }
}

pub struct TextFile {
    pub path: PathBuf,
    pub charset: String,
    pub content: String,
}

impl TextFile {
    pub fn open(path: &Path, detector: &dyn CharsetDetector) -> Result<Self, TextError> {
        let bytes = std::fs::read(path)?;
        let charset = detector
            .detect(&bytes)
            .unwrap_or_else(|| FALLBACK_CHARSET.to_string());
        debug!(path = %path.display(), %charset, bytes = bytes.len(), "detected charset");
        let (content, actual) = decode(&bytes, &charset)?;
        if actual.name() != charset {
            debug!(detected = %charset, used = actual.name(), "decoded with a different encoding");
        }
        Ok(Self {
            path: path.to_path_buf(),
            charset: actual.name().to_string(),
            content,
        })
    }
}

/// Decodes `bytes` with the charset named by `label` and re-assembles the
/// result line by line, so every line (including the last) ends in `\n`.
/// Returns the encoding actually used, which a byte-order mark may override.
pub fn decode(bytes: &[u8], label: &str) -> Result<(String, &'static Encoding), TextError> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| TextError::UnknownCharset(label.to_string()))?;
    let (decoded, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(charset = actual.name(), "malformed input replaced while decoding");
    }
    Ok((normalize_newlines(&decoded), actual))
}

pub fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut chars = text.chars().peekable();
    let mut line_open = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                line_open = false;
            }
            '\n' => {
                out.push('\n');
                line_open = false;
            }
            other => {
                out.push(other);
                line_open = true;
            }
        }
    }
    if line_open {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_every_line_ending() {
        assert_eq!(normalize_newlines("a\r\nb\rc\nd"), "a\nb\nc\nd\n");
        assert_eq!(normalize_newlines("tail\n"), "tail\n");
        assert_eq!(normalize_newlines(""), "");
        assert_eq!(normalize_newlines("\n\n"), "\n\n");
    }

    #[test]
    fn decodes_gbk() {
        let (bytes, _, _) = encoding_rs::GBK.encode("第一章 开端");
        let (text, used) = decode(&bytes, "GBK").expect("gbk decodes");
        assert_eq!(text, "第一章 开端\n");
        assert_eq!(used, encoding_rs::GBK);
    }

    #[test]
    fn strips_utf8_bom() {
        let bytes = b"\xEF\xBB\xBFhello".to_vec();
        let (text, _) = decode(&bytes, "utf-8").expect("decodes");
        assert_eq!(text, "hello\n");
    }

    #[test]
    fn rejects_unknown_labels() {
        let err = decode(b"abc", "klingon-8").unwrap_err();
        assert!(matches!(err, TextError::UnknownCharset(ref l) if l == "klingon-8"));
    }

    #[test]
    fn sniffs_boms_and_utf8() {
        let sniffer = BomSniffer;
        assert_eq!(sniffer.detect(b"\xFF\xFEa\x00").as_deref(), Some("UTF-16LE"));
        assert_eq!(sniffer.detect("纯文本".as_bytes()).as_deref(), Some("UTF-8"));
        let (gbk, _, _) = encoding_rs::GBK.encode("纯文本");
        assert_eq!(sniffer.detect(&gbk), None);
        assert_eq!(sniffer.detect(b""), None);
    }

    #[test]
    fn bom_overrides_requested_charset() {
        let bytes = "\u{FEFF}第一章 开端".as_bytes().to_vec();
        let (text, used) = decode(&bytes, "GBK").expect("decodes");
        assert_eq!(text, "第一章 开端\n");
        assert_eq!(used, UTF_8);
    }

    #[test]
    fn open_reports_the_encoding_used() {
        struct AlwaysGbk;
        impl CharsetDetector for AlwaysGbk {
            fn detect(&self, _bytes: &[u8]) -> Option<String> {
                Some("GBK".to_string())
            }
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bom.txt");
        std::fs::write(&path, "\u{FEFF}正文".as_bytes()).expect("write");
        let file = TextFile::open(&path, &AlwaysGbk).expect("opens");
        assert_eq!(file.charset, "UTF-8");
        assert_eq!(file.content, "正文\n");
    }

    #[test]
    fn sniffer_guesses_legacy_chinese_encodings() {
        let traditional = "第一章 開端\n從前有座山，山上有座廟，廟裡有個老和尚在給小和尚講故事。\n\
            老和尚說：從前有座山，山上有座廟，廟裡有個老和尚。這個故事講了很多遍。\n";
        let (big5, _, _) = encoding_rs::BIG5.encode(traditional);
        assert_eq!(EncodingSniffer.detect(&big5).as_deref(), Some("Big5"));

        let simplified = "第一章 开端\n从前有座山，山上有座庙，庙里有个老和尚在给小和尚讲故事。\n\
            老和尚说：从前有座山，山上有座庙，庙里有个老和尚。这个故事讲了很多遍。\n";
        let (gbk, _, _) = encoding_rs::GBK.encode(simplified);
        assert_eq!(EncodingSniffer.detect(&gbk).as_deref(), Some("GBK"));
    }

    #[test]
    fn sniffer_prefers_bom_and_utf8() {
        assert_eq!(EncodingSniffer.detect("纯文本".as_bytes()).as_deref(), Some("UTF-8"));
        assert_eq!(EncodingSniffer.detect(b"\xFE\xFF\x00a").as_deref(), Some("UTF-16BE"));
        assert_eq!(EncodingSniffer.detect(b""), None);
    }
}
