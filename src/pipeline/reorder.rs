//! Reorder stage: one generative call per slide, parsed into a titled record.
//!
//! The model is asked (see [`crate::prompts`]) to answer with
//! `제목: <title>` followed by `본문: <body>`. Parsing is isolated in
//! [`parse_reorder_response`] so the format contract can be tested without a
//! model in the loop.

use crate::error::{PageError, ServiceError};
use crate::output::SlideRecord;
use crate::prompts::{reorder_prompt, BODY_MARKER, TITLE_MARKER};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// An image sent alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// `(prompt, attachments) → response text`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        attachments: &[Attachment],
    ) -> Result<String, ServiceError>;
}

/// Title and body recovered from a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSlide {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("response has no '제목:' title section")]
    MissingTitle,
    #[error("response has no '본문:' body section")]
    MissingBody,
}

static RE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s){}\s*(.+?)\s*{}",
        regex::escape(TITLE_MARKER),
        regex::escape(BODY_MARKER)
    ))
    .unwrap()
});

static RE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?s){}\s*(.+)", regex::escape(BODY_MARKER))).unwrap());

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Split a model response into title and body.
///
/// The title is flattened onto one line; the body keeps its line breaks.
/// Markdown emphasis around either section (`**제목:**`) is dropped.
pub fn parse_reorder_response(response: &str) -> Result<ParsedSlide, ParseFailure> {
    let is_noise = |c: char| c == '*' || c.is_whitespace();

    let body = RE_BODY
        .captures(response)
        .map(|c| c[1].trim_matches(is_noise).to_string())
        .filter(|b| !b.is_empty())
        .ok_or(ParseFailure::MissingBody)?;

    let title = RE_TITLE
        .captures(response)
        .map(|c| RE_WS.replace_all(&c[1].replace('*', ""), " ").trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ParseFailure::MissingTitle)?;

    Ok(ParsedSlide { title, text: body })
}

/// Reorder the sanitized text at `input` and write the record to `output`.
///
/// The record file holds a JSON array with a single
/// `{"slide_number", "title", "text"}` object.
pub async fn run_reorder(
    generator: &dyn TextGenerator,
    page: usize,
    input: &Path,
    output: &Path,
    timeout_secs: u64,
) -> Result<SlideRecord, PageError> {
    let call_failed = |detail: String| PageError::ReorderCallFailed { page, detail };

    let text = tokio::fs::read_to_string(input)
        .await
        .map_err(|e| call_failed(format!("{}: {}", input.display(), e)))?;
    let prompt = reorder_prompt(&text);

    let response = match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        generator.generate(&prompt, &[]),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout { secs: timeout_secs }),
    }
    .map_err(|e| call_failed(e.to_string()))?;

    let parsed = parse_reorder_response(&response).map_err(|e| PageError::ReorderParseFailed {
        page,
        detail: e.to_string(),
    })?;
    debug!("Slide {}: titled '{}'", page, parsed.title);

    let record = SlideRecord {
        slide_number: page,
        title: parsed.title,
        text: parsed.text,
    };
    let json = serde_json::to_string_pretty(std::slice::from_ref(&record))
        .map_err(|e| call_failed(e.to_string()))?;
    tokio::fs::write(output, json)
        .await
        .map_err(|e| call_failed(format!("{}: {}", output.display(), e)))?;

    Ok(record)
}
