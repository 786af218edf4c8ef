//! Output canonicalisation and comparison.
//!
//! Both sides of a comparison go through the same normalisation, so a
//! submission is never penalised for line-ending flavour or trailing
//! whitespace: CR LF becomes LF, every line loses trailing whitespace, and
//! trailing blank lines are dropped. Comparison is byte-exact after that.

/// Canonicalise program output for comparison.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let trimmed: Vec<&str> = unified.split('\n').map(str::trim_end).collect();
    let joined = trimmed.join("\n");
    joined.trim_end_matches('\n').to_string()
}

/// True when actual and expected output are equal after normalisation.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}
