//! Presentation → PDF conversion via headless LibreOffice.
//!
//! Runs once per document, before rasterisation, and only for PPT/PPTX
//! sources. Any failure here is fatal for the run.

use super::input::SourceDocument;
use crate::error::SlideError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Turns a presentation into a PDF inside `out_dir`.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, source: &SourceDocument, out_dir: &Path)
        -> Result<PathBuf, SlideError>;
}

/// [`DocumentConverter`] backed by `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    binary: PathBuf,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Per-user LibreOffice profile so headless runs don't fight a desktop session.
    fn profile_dir() -> PathBuf {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        home.join(".config").join("libreoffice").join("4")
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

/// The PDF LibreOffice writes for `source` into `out_dir`.
pub fn converted_pdf_path(source: &SourceDocument, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.pdf", source.stem()))
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(
        &self,
        source: &SourceDocument,
        out_dir: &Path,
    ) -> Result<PathBuf, SlideError> {
        let fail = |detail: String| SlideError::ConversionFailed {
            path: source.path.clone(),
            detail,
        };

        if !source.format.needs_conversion() {
            return Ok(source.path.clone());
        }

        let profile = Self::profile_dir();
        tokio::fs::create_dir_all(&profile)
            .await
            .map_err(|e| fail(format!("cannot create LibreOffice profile dir: {e}")))?;

        info!(
            "Converting {} to PDF with {}",
            source.path.display(),
            self.binary.display()
        );

        let output = Command::new(&self.binary)
            .args([
                "--headless",
                "--nologo",
                "--nofirststartwizard",
                "--nodefault",
                "--nolockcheck",
                "--norestore",
                "-env:JavaDisabled=true",
            ])
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .args(["--convert-to", "pdf:impress_pdf_Export", "--outdir"])
            .arg(out_dir)
            .arg(&source.path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    fail(format!(
                        "LibreOffice binary '{}' not found. Install libreoffice.",
                        self.binary.display()
                    ))
                } else {
                    fail(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(fail(format!(
                "soffice exited with {}. STDOUT: {} STDERR: {}",
                output.status,
                String::from_utf8_lossy(&output.stdout).trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pdf = converted_pdf_path(source, out_dir);
        if !pdf.exists() {
            return Err(fail(format!(
                "conversion reported success but {} is missing",
                pdf.display()
            )));
        }

        debug!("Converted PDF: {}", pdf.display());
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::SourceFormat;
    use tempfile::TempDir;

    fn pptx(dir: &TempDir) -> SourceDocument {
        let path = dir.path().join("week3.pptx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();
        SourceDocument {
            path,
            format: SourceFormat::Pptx,
        }
    }

    #[test]
    fn converted_path_uses_source_stem() {
        let dir = TempDir::new().unwrap();
        let src = pptx(&dir);
        assert_eq!(
            converted_pdf_path(&src, Path::new("/out")),
            PathBuf::from("/out/week3.pdf")
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_conversion_error() {
        let dir = TempDir::new().unwrap();
        let src = pptx(&dir);
        let converter = SofficeConverter::new("/nonexistent/soffice-binary");
        let err = converter.convert(&src, dir.path()).await.unwrap_err();
        assert!(matches!(err, SlideError::ConversionFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn pdf_sources_pass_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.pdf");
        let src = SourceDocument {
            path: path.clone(),
            format: SourceFormat::Pdf,
        };
        let out = SofficeConverter::default()
            .convert(&src, dir.path())
            .await
            .unwrap();
        assert_eq!(out, path);
    }
}
