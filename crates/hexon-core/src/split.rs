//! PDF Split algorithm
//!
//! Builds one new document per planned output. Each output is assembled from
//! page clones, so a failure in one output leaves its siblings intact.

use tracing::{debug, info, instrument, warn};

use crate::artifact::{ArtifactKind, OutputArtifact};
use crate::document::{CompressionProfile, OutputDocument, SourceDocument};
use crate::error::HexonError;
use crate::planner::{PlannedOutput, SplitPlan};

/// A successfully produced split output
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub label: String,
    pub artifact: OutputArtifact,
}

/// A split output that could not be produced
#[derive(Debug, Clone)]
pub struct FailedOutput {
    pub label: String,
    pub error: HexonError,
}

/// Everything a split produced, in plan order
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub total_pages: u32,
    pub outputs: Vec<SplitOutput>,
    pub failures: Vec<FailedOutput>,
}

impl SplitReport {
    /// `PartialSplitFailure` when at least one output failed
    pub fn partial_failure(&self) -> Option<HexonError> {
        if self.failures.is_empty() {
            return None;
        }
        Some(HexonError::PartialSplitFailure {
            succeeded: self.outputs.len(),
            failed: self.failures.len(),
        })
    }

}

/// Split a document according to a validated plan
///
/// Outputs are produced sequentially in plan order. When every output fails,
/// the first failure is returned as the error.
#[instrument(skip_all, fields(total_pages = source.page_count(), outputs = plan.output_count()))]
pub fn split(source: &SourceDocument, plan: &SplitPlan) -> Result<SplitReport, HexonError> {
    let planned = plan.outputs();
    let mut outputs = Vec::with_capacity(planned.len());
    let mut failures = Vec::new();

    for entry in planned {
        match build_output(source, &entry) {
            Ok(artifact) => {
                debug!(label = %entry.label, name = %artifact.name, pages = artifact.page_count, "Split output written");
                outputs.push(SplitOutput {
                    label: entry.label,
                    artifact,
                });
            }
            Err(error) => {
                warn!(label = %entry.label, %error, "Split output failed");
                failures.push(FailedOutput {
                    label: entry.label,
                    error,
                });
            }
        }
    }

    if outputs.is_empty() && !failures.is_empty() {
        return Err(failures.swap_remove(0).error);
    }

    let report = SplitReport {
        total_pages: source.page_count(),
        outputs,
        failures,
    };
    info!(
        succeeded = report.outputs.len(),
        failed = report.failures.len(),
        "Split complete"
    );
    Ok(report)
}

fn build_output(source: &SourceDocument, entry: &PlannedOutput) -> Result<OutputArtifact, HexonError> {
    let pages = source.copy_pages(&entry.indices)?;
    let mut output = OutputDocument::new(source.version());
    output.append(pages)?;
    let page_count = output.page_count();
    let bytes = output.serialize(CompressionProfile::Medium)?;
    Ok(OutputArtifact::new(ArtifactKind::Split, bytes, page_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_test_pdf, page_texts, TestPdf};
    use lopdf::Document;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn source(pages: u32, prefix: &str) -> SourceDocument {
        SourceDocument::load(&create_test_pdf(pages, prefix)).unwrap()
    }

    fn texts(artifact: &OutputArtifact) -> Vec<String> {
        page_texts(&Document::load_mem(&artifact.bytes).unwrap())
    }

    #[test]
    fn test_single_split() {
        let doc = source(3, "S");
        let report = split(&doc, &SplitPlan::single(3).unwrap()).unwrap();

        assert_eq!(report.total_pages, 3);
        assert!(report.failures.is_empty());
        assert_eq!(report.partial_failure(), None);
        let labels: Vec<&str> = report.outputs.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Page 1", "Page 2", "Page 3"]);
        for (i, out) in report.outputs.iter().enumerate() {
            assert_eq!(out.artifact.page_count, 1);
            assert_eq!(texts(&out.artifact), vec![format!("S-Page-{}", i + 1)]);
        }
    }

    #[test]
    fn test_extract_single_page() {
        let doc = source(5, "E");
        let report = split(&doc, &SplitPlan::extract(3, 3, 5).unwrap()).unwrap();
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].artifact.page_count, 1);
        assert_eq!(texts(&report.outputs[0].artifact), vec!["E-Page-3"]);
    }

    #[test]
    fn test_ranges_split() {
        let doc = source(10, "R");
        let plan = SplitPlan::ranges(&[(1, 3), (4, 10)], 10).unwrap();
        let report = split(&doc, &plan).unwrap();

        let counts: Vec<u32> = report.outputs.iter().map(|o| o.artifact.page_count).collect();
        assert_eq!(counts, vec![3, 7]);
        assert_eq!(report.outputs[0].label, "Part 1 (Pages 1-3)");
        assert_eq!(report.outputs[1].label, "Part 2 (Pages 4-10)");
        assert_eq!(texts(&report.outputs[1].artifact)[0], "R-Page-4");
    }

    #[test]
    fn test_overlapping_ranges_duplicate_pages() {
        let doc = source(4, "O");
        let plan = SplitPlan::ranges(&[(1, 2), (2, 3)], 4).unwrap();
        let report = split(&doc, &plan).unwrap();
        assert_eq!(texts(&report.outputs[0].artifact), vec!["O-Page-1", "O-Page-2"]);
        assert_eq!(texts(&report.outputs[1].artifact), vec!["O-Page-2", "O-Page-3"]);
    }

    #[test]
    fn test_artifact_names_are_distinct() {
        let doc = source(4, "N");
        let report = split(&doc, &SplitPlan::single(4).unwrap()).unwrap();
        let names: HashSet<&str> = report.outputs.iter().map(|o| o.artifact.name.as_str()).collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.starts_with("split_")));
    }

    #[test]
    fn test_partial_failure_keeps_siblings() {
        let pdf = TestPdf::new(4, "P").cyclic_contents(2).build();
        let doc = SourceDocument::load(&pdf).unwrap();
        let plan = SplitPlan::ranges(&[(1, 2), (3, 3), (4, 4)], 4).unwrap();
        let report = split(&doc, &plan).unwrap();

        assert_eq!(report.outputs.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].label, "Part 2 (Pages 3-3)");
        assert!(matches!(report.failures[0].error, HexonError::SerializeError(_)));
        assert_eq!(
            report.partial_failure(),
            Some(HexonError::PartialSplitFailure {
                succeeded: 2,
                failed: 1
            })
        );
    }

    #[test]
    fn test_all_outputs_failing_returns_first_error() {
        let pdf = TestPdf::new(2, "F").cyclic_contents(0).cyclic_contents(1).build();
        let doc = SourceDocument::load(&pdf).unwrap();
        let err = split(&doc, &SplitPlan::single(2).unwrap()).unwrap_err();
        assert!(matches!(err, HexonError::SerializeError(_)));
    }

    #[test]
    fn test_source_unchanged_after_split() {
        let doc = source(3, "U");
        split(&doc, &SplitPlan::single(3).unwrap()).unwrap();
        split(&doc, &SplitPlan::extract(1, 3, 3).unwrap()).unwrap();
        assert_eq!(doc.page_count(), 3);
    }
}
