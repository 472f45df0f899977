//! Gap identification
//!
//! Pure over run state: changed files, the latest measured snapshot and the
//! recorded MC/DC obligations.

use super::{CoverageGap, CoverageRun, GapPriority, GapType, McdcRecord};
use crate::diff::group_lines;
use crate::mcdc::McdcTestCase;
use std::cmp::Ordering;
use tracing::debug;

/// Line gaps at least this long are `MEDIUM`
const MEDIUM_GAP_LINES: u32 = 5;
const CRITICAL_RISK_BONUS: f64 = 0.3;
const PER_LINE_RISK: f64 = 0.02;
const MAX_SIZE_RISK: f64 = 0.2;

/// Find untested regions of the change, most urgent first
pub fn identify_gaps(run: &CoverageRun) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();

    match &run.latest_snapshot {
        Some(snapshot) => {
            for file in &run.changed_files {
                let uncovered: Vec<u32> = file
                    .changed_lines()
                    .filter(|line| !snapshot.is_line_covered(&file.path, *line))
                    .collect();
                if uncovered.is_empty() {
                    continue;
                }

                if uncovered.len() == file.line_count() {
                    let start = uncovered[0];
                    let end = uncovered[uncovered.len() - 1];
                    gaps.push(gap(
                        run,
                        &file.path,
                        start,
                        end,
                        GapType::UncoveredPath,
                        format!(
                            "No test reaches the changes in {}; add a test whose call path executes lines {}-{}",
                            file.path, start, end
                        ),
                    ));
                    continue;
                }

                for range in group_lines(uncovered) {
                    gaps.push(gap(
                        run,
                        &file.path,
                        range.start,
                        range.end,
                        GapType::UncoveredLines,
                        format!("Add a test that executes {} lines {}", file.path, range),
                    ));
                }
            }

            for branch in &snapshot.uncovered_branches {
                let Some(file) = run.changed_file(&branch.file_path) else {
                    continue;
                };
                if !file.contains_line(branch.line) {
                    continue;
                }
                let detail = branch
                    .description
                    .as_deref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                gaps.push(gap(
                    run,
                    &branch.file_path,
                    branch.line,
                    branch.line,
                    GapType::UncoveredBranch,
                    format!(
                        "Add a test that takes the untaken branch at {}:{}{}",
                        branch.file_path, branch.line, detail
                    ),
                ));
            }
        }
        None if !run.changed_files.is_empty() => {
            debug!(run = %run.run_id, "no measured coverage; line and branch gaps unavailable");
        }
        None => {}
    }

    for record in &run.mcdc_records {
        gaps.extend(mcdc_gaps(run, record));
    }

    gaps.sort_by(compare_gaps);
    gaps
}

fn mcdc_gaps(run: &CoverageRun, record: &McdcRecord) -> Vec<CoverageGap> {
    let line = u32::try_from(record.line_number).unwrap_or(u32::MAX);
    let mut gaps = Vec::new();

    if record.complexity_exceeded {
        gaps.push(gap(
            run,
            &record.file_path,
            line,
            line,
            GapType::PartialMcdc,
            format!(
                "Decision `{}` has too many conditions for MC/DC analysis; split it into smaller decisions",
                record.expression
            ),
        ));
        return gaps;
    }

    for (id, text) in &record.unpaired_conditions {
        gaps.push(gap(
            run,
            &record.file_path,
            line,
            line,
            GapType::UncoveredCondition,
            format!(
                "Condition {} (`{}`) never independently affects `{}`; simplify the decision or remove the masked condition",
                id, text, record.expression
            ),
        ));
    }

    let pending = record.pending_cases();
    if record.is_achievable && !pending.is_empty() {
        let cases: Vec<String> = pending.iter().map(|c| describe_case(c)).collect();
        gaps.push(gap(
            run,
            &record.file_path,
            line,
            line,
            GapType::PartialMcdc,
            format!(
                "Execute the remaining MC/DC cases for `{}`: {}",
                record.expression,
                cases.join("; ")
            ),
        ));
    }

    gaps
}

fn describe_case(case: &McdcTestCase) -> String {
    let values: Vec<String> = case
        .condition_values
        .iter()
        .map(|(id, v)| format!("{}={}", id, v))
        .collect();
    format!(
        "{} ({} → {})",
        case.test_id,
        values.join(", "),
        case.expected_outcome
    )
}

fn gap(
    run: &CoverageRun,
    file_path: &str,
    line_start: u32,
    line_end: u32,
    gap_type: GapType,
    suggestion: String,
) -> CoverageGap {
    let critical = run.is_critical_file(file_path);
    let lines = line_end.saturating_sub(line_start) + 1;

    let priority = if critical {
        GapPriority::Critical
    } else {
        match gap_type {
            GapType::UncoveredBranch | GapType::UncoveredCondition | GapType::PartialMcdc => {
                GapPriority::High
            }
            GapType::UncoveredLines | GapType::UncoveredPath if lines >= MEDIUM_GAP_LINES => {
                GapPriority::Medium
            }
            _ => GapPriority::Low,
        }
    };

    let size_bonus = (PER_LINE_RISK * (lines - 1) as f64).min(MAX_SIZE_RISK);
    let critical_bonus = if critical { CRITICAL_RISK_BONUS } else { 0.0 };
    let risk_score = (gap_type.base_risk() + critical_bonus + size_bonus).clamp(0.0, 1.0);

    CoverageGap {
        file_path: file_path.to_string(),
        line_start,
        line_end,
        gap_type,
        priority,
        suggested_test: Some(suggestion),
        risk_score,
    }
}

fn compare_gaps(a: &CoverageGap, b: &CoverageGap) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then(b.risk_score.total_cmp(&a.risk_score))
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then(a.line_start.cmp(&b.line_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoverageConfig;
    use crate::coverage::{BranchLocation, CoverageSnapshot, RunContext};
    use crate::diff::{ChangedFile, LineRange};
    use crate::mcdc::analyze_decision;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn run_with(files: Vec<ChangedFile>, snapshot: Option<CoverageSnapshot>) -> CoverageRun {
        let mut run = CoverageRun::new(
            "run-gaps".into(),
            CoverageConfig::default(),
            RunContext::default(),
            Utc::now(),
        );
        run.changed_files = files;
        run.latest_snapshot = snapshot;
        run
    }

    fn covered(path: &str, lines: &[u32]) -> CoverageSnapshot {
        let mut snapshot = CoverageSnapshot::default();
        snapshot
            .covered_lines
            .insert(path.to_string(), lines.iter().copied().collect());
        snapshot
    }

    #[test]
    fn test_line_gaps_grouped_and_prioritized() {
        let files = vec![ChangedFile::new("src/ui/view.rs", vec![LineRange::new(1, 10)])];
        let run = run_with(files, Some(covered("src/ui/view.rs", &[1, 2, 8])));

        let gaps = identify_gaps(&run);
        assert_eq!(gaps.len(), 2);

        // 3-7 (5 lines) outranks 9-10
        assert_eq!((gaps[0].line_start, gaps[0].line_end), (3, 7));
        assert_eq!(gaps[0].priority, GapPriority::Medium);
        assert!((gaps[0].risk_score - 0.48).abs() < 1e-9);

        assert_eq!((gaps[1].line_start, gaps[1].line_end), (9, 10));
        assert_eq!(gaps[1].priority, GapPriority::Low);
        assert_eq!(gaps[1].gap_type, GapType::UncoveredLines);
    }

    #[test]
    fn test_untouched_critical_file_is_uncovered_path() {
        let files = vec![ChangedFile::new("src/auth/token.rs", vec![LineRange::new(4, 6)])];
        let run = run_with(files, Some(CoverageSnapshot::default()));

        let gaps = identify_gaps(&run);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].gap_type, GapType::UncoveredPath);
        assert_eq!(gaps[0].priority, GapPriority::Critical);
        assert!((gaps[0].risk_score - 0.84).abs() < 1e-9);
    }

    #[test]
    fn test_branch_gaps_only_inside_changes() {
        let files = vec![ChangedFile::new("lib/rules.py", vec![LineRange::new(20, 22)])];
        let mut snapshot = covered("lib/rules.py", &[20, 21, 22]);
        snapshot.uncovered_branches = vec![
            BranchLocation {
                file_path: "lib/rules.py".into(),
                line: 21,
                description: Some("else".into()),
            },
            BranchLocation {
                file_path: "lib/rules.py".into(),
                line: 90,
                description: None,
            },
        ];
        let run = run_with(files, Some(snapshot));

        let gaps = identify_gaps(&run);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].gap_type, GapType::UncoveredBranch);
        assert_eq!(gaps[0].priority, GapPriority::High);
        assert!(gaps[0].suggested_test.as_deref().unwrap().contains("(else)"));
    }

    #[test]
    fn test_mcdc_gaps() {
        let mut run = run_with(vec![], None);
        let pending = analyze_decision("a && b", "src/lib.rs", 12);
        let masked = analyze_decision("f(a && b) || c", "src/lib.rs", 30);
        let too_big = analyze_decision(
            "a && b && c && d && e && f && g && h && i",
            "src/payment/rules.rs",
            7,
        );
        run.mcdc_records = vec![
            McdcRecord::from_result(&pending),
            McdcRecord::from_result(&masked),
            McdcRecord::from_result(&too_big),
        ];

        let gaps = identify_gaps(&run);
        let kinds: Vec<(GapPriority, GapType, u32)> = gaps
            .iter()
            .map(|g| (g.priority, g.gap_type, g.line_start))
            .collect();

        assert_eq!(kinds[0], (GapPriority::Critical, GapType::PartialMcdc, 7));
        assert!(kinds
            .iter()
            .any(|k| *k == (GapPriority::High, GapType::PartialMcdc, 12)));
        assert!(kinds
            .iter()
            .any(|k| k.1 == GapType::UncoveredCondition && k.2 == 30));
        assert!(gaps
            .iter()
            .all(|g| g.risk_score >= 0.0 && g.risk_score <= 1.0));
    }
}
