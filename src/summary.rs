// src/summary.rs
//
// =============================================================================
// DRBOT: SUMMARIZER
// =============================================================================
//
// Turns the session's findings into report lines: one "Found ..." line per
// finding plus a running subtotal per check title. Relies on the store
// handing over rows already ordered by (check title, record id).

use crate::store::Finding;
use crate::tmplog::TmpLog;

/// Summarize `findings` into the temporary log.
///
/// Per row: `<marker> <origin>[, <subtype first 6 chars>], OBJECTID=<id>:
/// <title> (<notes>)`, with the subtype segment omitted when empty. Whenever
/// the title changes, the previous title's count is flushed as a
/// "Total N hits for <title>" line. A log with no marker lines at the end
/// gets a single "No errors found." line instead.
pub fn summarize(findings: &[Finding], marker: &str, tmp_log: &mut TmpLog) {
    let mut prev_title = String::new();
    let mut check_count = 0usize;

    for finding in findings {
        if finding.check_title != prev_title {
            if !prev_title.is_empty() {
                tmp_log.log(format!("Total {} hits for {}\n", check_count, prev_title));
            }
            prev_title = finding.check_title.clone();
            check_count = 0;
        }
        check_count += 1;

        let subtype: String = finding.subtype.chars().take(6).collect();
        let subtype_seg = if subtype.is_empty() {
            String::new()
        } else {
            format!(", {}", subtype)
        };
        tmp_log.log(format!(
            "{} {}{}, OBJECTID={}: {} ({})",
            marker, finding.origin_table, subtype_seg, finding.object_id,
            finding.check_title, finding.notes
        ));
    }
    if !prev_title.is_empty() {
        tmp_log.log(format!("Total {} hits for {}\n", check_count, prev_title));
    }

    if tmp_log.count_lines_with(marker) == 0 {
        tmp_log.log("No errors found.");
    }
}
