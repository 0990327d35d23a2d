//! Page-range planning
//!
//! Turns a raw split request into a validated `SplitPlan`. Validation happens
//! here, before any document is copied or written.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::SourceDocument;
use crate::error::HexonError;

/// Inclusive, 1-indexed page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub start: u32,
    pub end: u32,
}

impl RangeSpec {
    /// Build a range, checking `1 <= start <= end <= total_pages`
    pub fn new(start: u32, end: u32, total_pages: u32) -> Result<Self, HexonError> {
        if start < 1 {
            return Err(HexonError::InvalidRange(format!(
                "Start page {} must be >= 1",
                start
            )));
        }
        if start > end {
            return Err(HexonError::InvalidRange(format!(
                "Start {} > end {}",
                start, end
            )));
        }
        if end > total_pages {
            return Err(HexonError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                end, total_pages
            )));
        }
        Ok(RangeSpec { start, end })
    }

    /// 0-based page indices covered by this range
    pub fn indices(&self) -> Vec<usize> {
        (self.start - 1..self.end).map(|p| p as usize).collect()
    }
}

/// How a split request divides a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitPlan {
    /// One output per page
    Single { total_pages: u32 },
    /// One output holding a single range
    Extract(RangeSpec),
    /// One output per range, in request order
    Ranges(Vec<RangeSpec>),
}

/// One output document of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub label: String,
    /// 0-based source page indices, in output order
    pub indices: Vec<usize>,
}

impl SplitPlan {
    pub fn single(total_pages: u32) -> Result<Self, HexonError> {
        if total_pages < 1 {
            return Err(HexonError::InvalidRange("Document has no pages".into()));
        }
        Ok(SplitPlan::Single { total_pages })
    }

    pub fn extract(start: u32, end: u32, total_pages: u32) -> Result<Self, HexonError> {
        Ok(SplitPlan::Extract(RangeSpec::new(start, end, total_pages)?))
    }

    /// Validate every `(start, end)` pair; any bad pair rejects the whole plan
    pub fn ranges(ranges: &[(u32, u32)], total_pages: u32) -> Result<Self, HexonError> {
        if ranges.is_empty() {
            return Err(HexonError::InvalidRange("No page ranges specified".into()));
        }
        let specs = ranges
            .iter()
            .map(|&(start, end)| RangeSpec::new(start, end, total_pages))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SplitPlan::Ranges(specs))
    }

    /// The outputs this plan produces, in order
    pub fn outputs(&self) -> Vec<PlannedOutput> {
        match self {
            SplitPlan::Single { total_pages } => (1..=*total_pages)
                .map(|page| PlannedOutput {
                    label: format!("Page {}", page),
                    indices: vec![(page - 1) as usize],
                })
                .collect(),
            SplitPlan::Extract(range) => {
                let label = if range.start == range.end {
                    format!("Page {}", range.start)
                } else {
                    format!("Pages {}-{}", range.start, range.end)
                };
                vec![PlannedOutput {
                    label,
                    indices: range.indices(),
                }]
            }
            SplitPlan::Ranges(ranges) => ranges
                .iter()
                .enumerate()
                .map(|(i, range)| PlannedOutput {
                    label: format!("Part {} (Pages {}-{})", i + 1, range.start, range.end),
                    indices: range.indices(),
                })
                .collect(),
        }
    }

    pub fn output_count(&self) -> usize {
        match self {
            SplitPlan::Single { total_pages } => *total_pages as usize,
            SplitPlan::Extract(_) => 1,
            SplitPlan::Ranges(ranges) => ranges.len(),
        }
    }
}

/// Kind of split requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Single,
    Extract,
    Range,
}

impl std::str::FromStr for SplitType {
    type Err = HexonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(SplitType::Single),
            "extract" => Ok(SplitType::Extract),
            "range" | "ranges" => Ok(SplitType::Range),
            other => Err(HexonError::InvalidRange(format!(
                "Unknown split type '{}'. Must be 'single', 'extract', or 'range'",
                other
            ))),
        }
    }
}

/// Raw split descriptor as submitted by a client form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    pub split_type: Option<String>,
    pub start_page: Option<String>,
    pub end_page: Option<String>,
    /// JSON `[{"start":1,"end":3}]` or an expression like `"1-3, 4-10"`
    pub page_ranges: Option<String>,
}

impl SplitRequest {
    /// Validate the request against a document's page count
    pub fn plan(&self, total_pages: u32) -> Result<SplitPlan, HexonError> {
        let split_type = match self.split_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => SplitType::Single,
        };

        let plan = match split_type {
            SplitType::Single => SplitPlan::single(total_pages)?,
            SplitType::Extract => {
                let start = parse_page_number("startPage", self.start_page.as_deref())?;
                let end = parse_page_number("endPage", self.end_page.as_deref())?;
                SplitPlan::extract(start, end, total_pages)?
            }
            SplitType::Range => {
                let raw = self.page_ranges.as_deref().unwrap_or("");
                SplitPlan::ranges(&parse_ranges(raw)?, total_pages)?
            }
        };

        debug!(?split_type, outputs = plan.output_count(), "Planned split");
        Ok(plan)
    }

    /// Plan against a loaded document
    pub fn plan_for(&self, source: &SourceDocument) -> Result<SplitPlan, HexonError> {
        self.plan(source.page_count())
    }
}

fn parse_page_number(field: &str, raw: Option<&str>) -> Result<u32, HexonError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HexonError::InvalidRange(format!("Missing {}", field)))?;
    raw.parse()
        .map_err(|_| HexonError::InvalidRange(format!("Invalid {}: {}", field, raw)))
}

#[derive(Deserialize)]
struct RawRange {
    start: serde_json::Value,
    end: serde_json::Value,
}

/// Parse page ranges in request order
///
/// Accepts the JSON form `[{"start":1,"end":3},{"start":4,"end":10}]` or a
/// comma-separated expression `"1-3, 4-10, 12"`, where a bare number `n`
/// stands for `n-n`. Order is kept and nothing is deduplicated.
pub fn parse_ranges(input: &str) -> Result<Vec<(u32, u32)>, HexonError> {
    let input = input.trim();
    if input.starts_with('[') {
        return parse_json_ranges(input);
    }

    let mut ranges = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| HexonError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| HexonError::InvalidRange(format!("Invalid end: {}", end)))?;
            ranges.push((start, end));
        } else {
            // Single page like "5"
            let page: u32 = part
                .parse()
                .map_err(|_| HexonError::InvalidRange(format!("Invalid page: {}", part)))?;
            ranges.push((page, page));
        }
    }

    Ok(ranges)
}

fn parse_json_ranges(input: &str) -> Result<Vec<(u32, u32)>, HexonError> {
    let raw: Vec<RawRange> = serde_json::from_str(input)
        .map_err(|e| HexonError::InvalidRange(format!("Malformed page ranges: {}", e)))?;

    raw.iter()
        .map(|r| Ok((json_page("start", &r.start)?, json_page("end", &r.end)?)))
        .collect()
}

/// Page numbers arrive as numbers or as numeric strings
fn json_page(field: &str, value: &serde_json::Value) -> Result<u32, HexonError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| HexonError::InvalidRange(format!("Invalid {}: {}", field, value)))
}

/// Ordered merge inputs
#[derive(Debug)]
pub struct MergePlan {
    sources: Vec<SourceDocument>,
}

impl MergePlan {
    /// At least one source; a single source is a degenerate but valid merge
    pub fn new(sources: Vec<SourceDocument>) -> Result<Self, HexonError> {
        if sources.is_empty() {
            return Err(HexonError::MergeError("No documents to merge".into()));
        }
        if sources.len() == 1 {
            warn!("Merge requested with a single document");
        }
        Ok(MergePlan { sources })
    }

    pub fn sources(&self) -> &[SourceDocument] {
        &self.sources
    }

    pub fn total_pages(&self) -> u32 {
        self.sources.iter().map(SourceDocument::page_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::create_test_pdf;
    use pretty_assertions::assert_eq;

    fn labels(plan: &SplitPlan) -> Vec<String> {
        plan.outputs().into_iter().map(|o| o.label).collect()
    }

    #[test]
    fn test_range_spec_bounds() {
        assert!(RangeSpec::new(1, 1, 1).is_ok());
        assert!(RangeSpec::new(0, 1, 5).is_err());
        assert!(RangeSpec::new(5, 2, 10).is_err());
        assert!(RangeSpec::new(2, 6, 5).is_err());
        assert_eq!(RangeSpec::new(2, 4, 5).unwrap().indices(), vec![1, 2, 3]);
    }

    #[test]
    fn test_single_plan_labels_every_page() {
        let plan = SplitPlan::single(3).unwrap();
        assert_eq!(labels(&plan), vec!["Page 1", "Page 2", "Page 3"]);
        assert!(plan.outputs().iter().all(|o| o.indices.len() == 1));
    }

    #[test]
    fn test_single_plan_requires_pages() {
        assert!(matches!(
            SplitPlan::single(0),
            Err(HexonError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_extract_same_page() {
        let plan = SplitPlan::extract(3, 3, 5).unwrap();
        let outputs = plan.outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].indices, vec![2]);
        assert_eq!(outputs[0].label, "Page 3");
    }

    #[test]
    fn test_extract_range_label() {
        let plan = SplitPlan::extract(10, 20, 25).unwrap();
        assert_eq!(labels(&plan), vec!["Pages 10-20"]);
    }

    #[test]
    fn test_ranges_keep_request_order_and_overlap() {
        let plan = SplitPlan::ranges(&[(4, 10), (1, 3), (2, 5)], 10).unwrap();
        assert_eq!(
            labels(&plan),
            vec![
                "Part 1 (Pages 4-10)",
                "Part 2 (Pages 1-3)",
                "Part 3 (Pages 2-5)"
            ]
        );
        assert_eq!(plan.outputs()[2].indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_one_bad_range_rejects_plan() {
        let err = SplitPlan::ranges(&[(1, 3), (5, 2)], 10).unwrap_err();
        assert!(matches!(err, HexonError::InvalidRange(_)));
    }

    #[test]
    fn test_parse_ranges_expression() {
        assert_eq!(
            parse_ranges("1-3, 5, 8-10").unwrap(),
            vec![(1, 3), (5, 5), (8, 10)]
        );
    }

    #[test]
    fn test_parse_ranges_keeps_duplicates() {
        assert_eq!(parse_ranges("1-3, 2-4").unwrap(), vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn test_parse_ranges_json() {
        let json = r#"[{"start":1,"end":3},{"start":"4","end":10}]"#;
        assert_eq!(parse_ranges(json).unwrap(), vec![(1, 3), (4, 10)]);
    }

    #[test]
    fn test_parse_ranges_rejects_garbage() {
        assert!(parse_ranges("1-x").is_err());
        assert!(parse_ranges("[{\"start\":-1,\"end\":2}]").is_err());
        assert!(parse_ranges("[oops").is_err());
    }

    #[test]
    fn test_request_extract() {
        let req = SplitRequest {
            split_type: Some("extract".into()),
            start_page: Some("2".into()),
            end_page: Some(" 4 ".into()),
            page_ranges: None,
        };
        assert_eq!(
            req.plan(5).unwrap(),
            SplitPlan::Extract(RangeSpec { start: 2, end: 4 })
        );
    }

    #[test]
    fn test_request_extract_missing_page() {
        let req = SplitRequest {
            split_type: Some("extract".into()),
            start_page: Some("2".into()),
            ..Default::default()
        };
        assert!(matches!(req.plan(5), Err(HexonError::InvalidRange(_))));
    }

    #[test]
    fn test_request_unknown_split_type() {
        let req = SplitRequest {
            split_type: Some("halves".into()),
            ..Default::default()
        };
        assert!(matches!(req.plan(5), Err(HexonError::InvalidRange(_))));
    }

    #[test]
    fn test_request_empty_ranges() {
        let req = SplitRequest {
            split_type: Some("range".into()),
            page_ranges: Some("[]".into()),
            ..Default::default()
        };
        assert!(matches!(req.plan(5), Err(HexonError::InvalidRange(_))));
    }

    #[test]
    fn test_request_defaults_to_single() {
        let plan = SplitRequest::default().plan(2).unwrap();
        assert_eq!(plan, SplitPlan::Single { total_pages: 2 });
    }

    #[test]
    fn test_merge_plan_rejects_empty() {
        assert!(matches!(
            MergePlan::new(vec![]),
            Err(HexonError::MergeError(_))
        ));
    }

    #[test]
    fn test_merge_plan_counts_pages() {
        let a = SourceDocument::load(&create_test_pdf(2, "A")).unwrap();
        let b = SourceDocument::load(&create_test_pdf(3, "B")).unwrap();
        let plan = MergePlan::new(vec![a, b]).unwrap();
        assert_eq!(plan.total_pages(), 5);
        assert_eq!(plan.sources().len(), 2);
    }
}
