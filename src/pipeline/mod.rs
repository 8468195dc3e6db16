//! Pipeline stages and the collaborators they call.
//!
//! Each submodule implements exactly one transformation step or one external
//! seam. Collaborators sit behind async traits so the orchestrator can be
//! driven by fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ convert ──▶ render ──┬─▶ enhance ──▶ extract ──▶ sanitize ──▶ reorder
//! (path)   (soffice)   (pdfium)  │   (Lanczos)   (Vision)    (regex)      (LLM)
//!                                └── one chain per page ─────────────────────────
//! ```
//!
//! 1. [`input`]    — validate the source path and detect its format
//! 2. [`convert`]  — PPT/PPTX → PDF via headless LibreOffice
//! 3. [`render`]   — rasterise every page; runs in `spawn_blocking`
//! 4. [`enhance`]  — Lanczos upscale of one page image
//! 5. [`extract`]  — remote recognition ([`vision`]) + confidence partition
//! 6. [`sanitize`] — deterministic character filtering
//! 7. [`reorder`]  — one generative call ([`llm`], [`encode`]) + response parsing

pub mod convert;
pub mod encode;
pub mod enhance;
pub mod extract;
pub mod input;
pub mod llm;
pub mod render;
pub mod reorder;
pub mod sanitize;
pub mod vision;
