//! Remote text recognition via Google Cloud Vision `images:annotate`.
//!
//! Only `DOCUMENT_TEXT_DETECTION` is requested. The response tree
//! (pages → blocks → paragraphs → words → symbols) is flattened into one
//! [`RecognizedBlock`] per block: symbols are concatenated into words and
//! words joined with single spaces.

use crate::error::ServiceError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

/// One corner of a block's bounding polygon, in image pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

/// A text block as returned by the recognition service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedBlock {
    pub text: String,
    /// `None` when the service omitted a confidence for this block.
    pub confidence: Option<f32>,
    pub bounding_poly: Vec<Vertex>,
}

/// Full recognition output for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub full_text: String,
    pub blocks: Vec<RecognizedBlock>,
}

/// `(imageBytes) → Recognition`.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<Recognition, ServiceError>;
}

/// [`TextRecognizer`] over the Cloud Vision REST API with an API key.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextRecognizer for VisionClient {
    async fn recognize(&self, image: &[u8]) -> Result<Recognition, ServiceError> {
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "imageContext": { "languageHints": [] }
            }]
        });

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let recognition = parse_annotate_response(&text)?;
        debug!(
            "Vision returned {} blocks, {} chars",
            recognition.blocks.len(),
            recognition.full_text.chars().count()
        );
        Ok(recognition)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateBatch {
    responses: Vec<AnnotateResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnnotateResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiStatus {
    code: i32,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextAnnotation {
    text: String,
    pages: Vec<WirePage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePage {
    blocks: Vec<WireBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireBlock {
    bounding_box: Option<BoundingPoly>,
    paragraphs: Vec<Paragraph>,
    confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BoundingPoly {
    vertices: Vec<WireVertex>,
}

/// Vision omits zero coordinates entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireVertex {
    x: Option<i32>,
    y: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Paragraph {
    words: Vec<Word>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Word {
    symbols: Vec<Symbol>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Symbol {
    text: String,
}

/// Decode an `images:annotate` response body for a single-image request.
///
/// A response without `fullTextAnnotation` (an image with no text) yields an
/// empty [`Recognition`].
pub fn parse_annotate_response(body: &str) -> Result<Recognition, ServiceError> {
    let batch: AnnotateBatch =
        serde_json::from_str(body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

    let response = batch
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::MalformedResponse("empty `responses` array".into()))?;

    if let Some(err) = response.error {
        if err.code != 0 || !err.message.is_empty() {
            return Err(ServiceError::Api(format!("{} (code {})", err.message, err.code)));
        }
    }

    let Some(annotation) = response.full_text_annotation else {
        return Ok(Recognition::default());
    };

    let blocks = annotation
        .pages
        .into_iter()
        .flat_map(|p| p.blocks)
        .map(|block| {
            let text = block
                .paragraphs
                .iter()
                .flat_map(|p| &p.words)
                .map(|w| w.symbols.iter().map(|s| s.text.as_str()).collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            let bounding_poly = block
                .bounding_box
                .map(|b| {
                    b.vertices
                        .into_iter()
                        .map(|v| Vertex {
                            x: v.x.unwrap_or(0),
                            y: v.y.unwrap_or(0),
                        })
                        .collect()
                })
                .unwrap_or_default();
            RecognizedBlock {
                text,
                confidence: block.confidence,
                bounding_poly,
            }
        })
        .collect();

    Ok(Recognition {
        full_text: annotation.text,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "responses": [{
        "fullTextAnnotation": {
          "text": "운영체제 개요\nProcess 관리\n",
          "pages": [{
            "blocks": [
              {
                "boundingBox": { "vertices": [{"x": 10, "y": 5}, {"x": 200}, {"x": 200, "y": 40}, {"y": 40}] },
                "paragraphs": [{ "words": [
                  { "symbols": [{"text": "운"}, {"text": "영"}, {"text": "체"}, {"text": "제"}] },
                  { "symbols": [{"text": "개"}, {"text": "요"}] }
                ]}],
                "confidence": 0.98
              },
              {
                "paragraphs": [{ "words": [
                  { "symbols": [{"text": "Process"}] },
                  { "symbols": [{"text": "관리"}] }
                ]}]
              }
            ]
          }]
        }
      }]
    }"#;

    #[test]
    fn flattens_words_into_blocks() {
        let r = parse_annotate_response(SAMPLE).unwrap();
        assert_eq!(r.full_text, "운영체제 개요\nProcess 관리\n");
        assert_eq!(r.blocks.len(), 2);
        assert_eq!(r.blocks[0].text, "운영체제 개요");
        assert_eq!(r.blocks[0].confidence, Some(0.98));
        assert_eq!(r.blocks[1].text, "Process 관리");
        assert_eq!(r.blocks[1].confidence, None);
    }

    #[test]
    fn missing_coordinates_default_to_zero() {
        let r = parse_annotate_response(SAMPLE).unwrap();
        assert_eq!(
            r.blocks[0].bounding_poly,
            vec![
                Vertex { x: 10, y: 5 },
                Vertex { x: 200, y: 0 },
                Vertex { x: 200, y: 40 },
                Vertex { x: 0, y: 40 },
            ]
        );
        assert!(r.blocks[1].bounding_poly.is_empty());
    }

    #[test]
    fn image_without_text_is_empty() {
        let r = parse_annotate_response(r#"{"responses":[{}]}"#).unwrap();
        assert_eq!(r, Recognition::default());
    }

    #[test]
    fn api_error_is_surfaced() {
        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        match parse_annotate_response(body) {
            Err(ServiceError::Api(msg)) => assert!(msg.contains("Bad image data")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_annotate_response("<html>502</html>"),
            Err(ServiceError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_annotate_response(r#"{"responses":[]}"#),
            Err(ServiceError::MalformedResponse(_))
        ));
    }
}
