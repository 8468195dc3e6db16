//! Sanitize stage: reduce raw OCR text to what the reorder prompt can use.
//!
//! Recognition output on slides is full of bullets, arrows, box-drawing
//! glyphs and stray symbols picked up from diagrams. They carry no meaning
//! for the reorder step and only distract the model.
//!
//! ## Rule Order
//!
//! 1. Strip decorative glyphs (`■●◆★☆▶◀⚫`)
//! 2. Drop everything outside the allow-list: Hangul syllables, ASCII
//!    letters and digits, whitespace, and `. , ? ! : ; ( ) [ ] -`
//! 3. Collapse runs of newlines into one
//! 4. Collapse runs of two or more spaces into one
//! 5. Trim

use super::extract::OcrDocument;
use crate::error::PageError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

static RE_DECORATIVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[■●◆★☆▶◀⚫]").unwrap());

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^가-힣a-zA-Z0-9\s.,?!:;()\[\]\-]").unwrap());

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ]{2,}").unwrap());

/// Apply the sanitizer rules to `text`. Idempotent.
pub fn sanitize_for_llm(text: &str) -> String {
    let s = RE_DECORATIVE.replace_all(text, "");
    let s = RE_DISALLOWED.replace_all(&s, "");
    let s = RE_NEWLINES.replace_all(&s, "\n");
    let s = RE_SPACES.replace_all(&s, " ");
    s.trim().to_string()
}

/// Read the OCR document at `ocr_path`, sanitize its `full_text` and write
/// the result to `output`.
///
/// A missing, unreadable or blank `full_text` is [`PageError::EmptyContent`],
/// as is text that sanitizes down to nothing.
pub async fn run_sanitize(
    page: usize,
    ocr_path: &Path,
    output: &Path,
) -> Result<String, PageError> {
    let empty = || PageError::EmptyContent { page };

    let raw = tokio::fs::read_to_string(ocr_path).await.map_err(|e| {
        warn!("Slide {}: cannot read {}: {}", page, ocr_path.display(), e);
        empty()
    })?;
    let doc: OcrDocument = serde_json::from_str(&raw).map_err(|e| {
        warn!("Slide {}: bad OCR document {}: {}", page, ocr_path.display(), e);
        empty()
    })?;

    if doc.full_text.trim().is_empty() {
        return Err(empty());
    }

    let cleaned = sanitize_for_llm(&doc.full_text);
    if cleaned.is_empty() {
        return Err(empty());
    }

    tokio::fs::write(output, &cleaned).await.map_err(|e| {
        warn!("Slide {}: cannot write {}: {}", page, output.display(), e);
        empty()
    })?;

    debug!(
        "Slide {}: sanitized {} → {} chars",
        page,
        doc.full_text.chars().count(),
        cleaned.chars().count()
    );
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn strips_glyphs_and_symbols() {
        assert_eq!(sanitize_for_llm("■Hello★ 세계!! ***"), "Hello 세계!!");
    }

    #[test]
    fn keeps_allowed_punctuation() {
        let s = "1. 개요: (CPU) [스케줄링] - 질문? 예; 아니오!";
        assert_eq!(sanitize_for_llm(s), s);
    }

    #[test]
    fn collapses_newlines_and_spaces() {
        assert_eq!(
            sanitize_for_llm("  제목\n\n\n본문    내용  \n\n끝 "),
            "제목\n본문 내용 \n끝"
        );
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "■Hello★ 세계!! ***",
            "▶ 운영체제 → Process  관리\n\n\n● 메모리 → 페이징 @ 2024",
            "  \n\t혼합 text\u{200b} with 😀 emoji  \n",
            "",
        ];
        for input in inputs {
            let once = sanitize_for_llm(input);
            assert_eq!(sanitize_for_llm(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn output_stays_within_allow_list() {
        let out = sanitize_for_llm("Ω≈ç√∫ 한글 ABC 123 .,?!:;()[]- #$%^&* ㄱㄴ ä");
        for c in out.chars() {
            let ok = ('가'..='힣').contains(&c)
                || c.is_ascii_alphanumeric()
                || c.is_whitespace()
                || ".,?!:;()[]-".contains(c);
            assert!(ok, "unexpected char {c:?} in {out:?}");
        }
    }

    #[tokio::test]
    async fn empty_full_text_is_empty_content() {
        let dir = TempDir::new().unwrap();
        let ocr = dir.path().join("deck-01_ocr_result.json");
        std::fs::write(&ocr, r#"{"full_text": "   "}"#).unwrap();
        let out = dir.path().join("deck-01_cleaned.txt");

        let err = run_sanitize(1, &ocr, &out).await.unwrap_err();
        assert!(matches!(err, PageError::EmptyContent { page: 1 }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn symbols_only_is_empty_content() {
        let dir = TempDir::new().unwrap();
        let ocr = dir.path().join("deck-02_ocr_result.json");
        std::fs::write(&ocr, r#"{"full_text": "★ → ■ ●"}"#).unwrap();
        let err = run_sanitize(2, &ocr, &dir.path().join("x.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::EmptyContent { page: 2 }));
    }

    #[tokio::test]
    async fn writes_cleaned_text() {
        let dir = TempDir::new().unwrap();
        let ocr = dir.path().join("deck-03_ocr_result.json");
        std::fs::write(&ocr, r#"{"full_text": "● 프로세스  상태\n\n준비 → 실행"}"#).unwrap();
        let out = dir.path().join("deck-03_cleaned.txt");

        let cleaned = run_sanitize(3, &ocr, &out).await.unwrap();
        assert_eq!(cleaned, "프로세스 상태\n준비 실행");
        assert_eq!(std::fs::read_to_string(&out).unwrap(), cleaned);
    }
}
