// Strip invisible Unicode artifacts that break structured-text parsing.
// Pure: never fails, empty in → empty out, applying twice equals applying once.

use crate::pipeline::diagnostic::NormalizationReport;

const BOM: char = '\u{FEFF}';

/// Text after normalization plus what was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub report: NormalizationReport,
}

impl NormalizedText {
    pub fn was_modified(&self) -> bool {
        self.report.removed_chars > 0
    }
}

/// Remove a leading byte-order mark and the fixed set of invisible code points.
pub fn normalize_response(raw: &str) -> NormalizedText {
    let leading_bom = raw.starts_with(BOM);
    let mut removed_chars = 0;

    let text: String = raw
        .chars()
        .filter(|c| {
            if is_invisible(*c) {
                removed_chars += 1;
                false
            } else {
                true
            }
        })
        .collect();

    NormalizedText {
        text,
        report: NormalizationReport {
            removed_chars,
            leading_bom,
        },
    }
}

fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'  // Zero-width space
        | '\u{200C}' // Zero-width non-joiner
        | '\u{200D}' // Zero-width joiner
        | '\u{2028}' // Line separator
        | '\u{2029}' // Paragraph separator
        | BOM        // BOM / zero-width no-break space, leading or embedded
    )
}
