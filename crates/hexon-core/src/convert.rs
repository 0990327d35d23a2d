//! Office document conversion
//!
//! Conversion is delegated to an external program. The HTTP layer holds a
//! `DocumentConverter`; without a configured LibreOffice binary every
//! conversion answers `ConversionUnavailable`.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::artifact::{ArtifactKind, OutputArtifact};
use crate::document::SourceDocument;
use crate::error::HexonError;

/// Input format of a conversion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Word,
    Excel,
    PowerPoint,
    Html,
}

impl SourceFormat {
    /// Extension given to the input file handed to the converter
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Word => "docx",
            SourceFormat::Excel => "xlsx",
            SourceFormat::PowerPoint => "pptx",
            SourceFormat::Html => "html",
        }
    }

    /// Prefer the uploaded file's own extension when it belongs to this format
    pub fn extension_for(&self, filename: Option<&str>) -> &'static str {
        let ext = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        let known: &[&'static str] = match self {
            SourceFormat::Word => &["doc", "docx", "odt", "rtf", "txt"],
            SourceFormat::Excel => &["xls", "xlsx", "ods", "csv"],
            SourceFormat::PowerPoint => &["ppt", "pptx", "odp"],
            SourceFormat::Html => &["html", "htm"],
        };
        ext.and_then(|ext| known.iter().copied().find(|k| *k == ext))
            .unwrap_or_else(|| self.extension())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Word => "word",
            SourceFormat::Excel => "excel",
            SourceFormat::PowerPoint => "powerpoint",
            SourceFormat::Html => "html",
        }
    }
}

/// Turns a non-PDF document into PDF bytes
pub trait DocumentConverter: Send + Sync {
    fn convert(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        filename: Option<&str>,
    ) -> Result<Vec<u8>, HexonError>;
}

/// Converter used when no external program is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableConverter;

impl DocumentConverter for UnavailableConverter {
    fn convert(
        &self,
        _bytes: &[u8],
        format: SourceFormat,
        _filename: Option<&str>,
    ) -> Result<Vec<u8>, HexonError> {
        Err(HexonError::ConversionUnavailable(format!(
            "{} conversion is not configured on this server",
            format.as_str()
        )))
    }
}

/// LibreOffice in headless mode
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: PathBuf,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        OfficeConverter {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }
}

impl DocumentConverter for OfficeConverter {
    fn convert(
        &self,
        bytes: &[u8],
        format: SourceFormat,
        filename: Option<&str>,
    ) -> Result<Vec<u8>, HexonError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| HexonError::ConversionFailed(format!("Temp dir: {}", e)))?;
        let input = workdir
            .path()
            .join(format!("input.{}", format.extension_for(filename)));
        std::fs::write(&input, bytes)
            .map_err(|e| HexonError::ConversionFailed(format!("Write input: {}", e)))?;

        debug!(binary = %self.binary.display(), format = format.as_str(), "Running converter");
        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&input)
            .output()
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
                    HexonError::ConversionUnavailable(format!(
                        "Cannot run {}: {}",
                        self.binary.display(),
                        e
                    ))
                }
                _ => HexonError::ConversionFailed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, %stderr, "Converter exited with an error");
            return Err(HexonError::ConversionFailed(format!(
                "Converter exited with {}",
                output.status
            )));
        }

        let produced = workdir.path().join("input.pdf");
        let pdf = std::fs::read(&produced).map_err(|_| {
            HexonError::ConversionFailed("Converter produced no PDF".into())
        })?;

        // The result must open like any uploaded PDF
        SourceDocument::load(&pdf)
            .map_err(|e| HexonError::ConversionFailed(format!("Converter output unreadable: {}", e)))?;

        info!(format = format.as_str(), bytes = pdf.len(), "Converted document");
        Ok(pdf)
    }
}

/// Run a converter and wrap the result as an artifact
pub fn convert_document(
    converter: &dyn DocumentConverter,
    bytes: &[u8],
    format: SourceFormat,
    filename: Option<&str>,
) -> Result<OutputArtifact, HexonError> {
    let pdf = converter.convert(bytes, format, filename)?;
    let page_count = SourceDocument::load(&pdf)
        .map(|doc| doc.page_count())
        .map_err(|e| HexonError::ConversionFailed(e.to_string()))?;
    Ok(OutputArtifact::new(ArtifactKind::Converted, pdf, page_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::create_test_pdf;

    /// Returns a fixed PDF regardless of input
    struct FixedConverter(Vec<u8>);

    impl DocumentConverter for FixedConverter {
        fn convert(&self, _: &[u8], _: SourceFormat, _: Option<&str>) -> Result<Vec<u8>, HexonError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_unavailable_converter() {
        let err = UnavailableConverter
            .convert(b"data", SourceFormat::Word, None)
            .unwrap_err();
        assert!(matches!(err, HexonError::ConversionUnavailable(_)));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let converter = OfficeConverter::new("/nonexistent/hexon-soffice");
        let err = converter
            .convert(b"hello", SourceFormat::Html, Some("page.html"))
            .unwrap_err();
        assert!(matches!(err, HexonError::ConversionUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_binary_is_conversion_failure() {
        let converter = OfficeConverter::new("false");
        let err = converter
            .convert(b"hello", SourceFormat::Word, None)
            .unwrap_err();
        assert!(matches!(err, HexonError::ConversionFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_without_output_is_conversion_failure() {
        let converter = OfficeConverter::new("true");
        let err = converter
            .convert(b"hello", SourceFormat::Excel, None)
            .unwrap_err();
        assert!(matches!(err, HexonError::ConversionFailed(_)));
    }

    #[test]
    fn test_convert_document_wraps_artifact() {
        let converter = FixedConverter(create_test_pdf(2, "Conv"));
        let artifact =
            convert_document(&converter, b"ignored", SourceFormat::PowerPoint, None).unwrap();
        assert_eq!(artifact.page_count, 2);
        assert!(artifact.name.starts_with("converted_"));
    }

    #[test]
    fn test_convert_document_rejects_non_pdf() {
        let converter = FixedConverter(b"plain text".to_vec());
        let err = convert_document(&converter, b"x", SourceFormat::Word, None).unwrap_err();
        assert!(matches!(err, HexonError::ConversionFailed(_)));
    }

    #[test]
    fn test_extension_for_uses_upload_name() {
        assert_eq!(SourceFormat::Word.extension_for(Some("Report.DOC")), "doc");
        assert_eq!(SourceFormat::Word.extension_for(Some("notes.xlsx")), "docx");
        assert_eq!(SourceFormat::Excel.extension_for(None), "xlsx");
        assert_eq!(SourceFormat::Html.extension_for(Some("index.htm")), "htm");
    }
}
