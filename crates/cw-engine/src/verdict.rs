//! Verdict classification — the single source of truth for mapping a
//! process outcome to a verdict.

use cw_core::types::{Language, ProcessOutcome, Verdict};

use crate::compare::outputs_match;

/// Exit codes the system `timeout` wrapper uses for a killed child; seen
/// here raw when the supervisor could not reclassify them itself.
const TIMEOUT_EXIT_CODES: [i32; 2] = [124, 137];

/// Classify one run. Order is significant:
/// 1. memory watchdog kill
/// 2. JVM `OutOfMemoryError` on stderr (Java reports heap exhaustion as a
///    normal abnormal exit, below the RSS cap plus headroom)
/// 3. deadline kill, including raw `timeout` wrapper exit codes
/// 4. any other non-zero exit
/// 5. output comparison
pub fn classify(language: Language, outcome: &ProcessOutcome, expected_stdout: &str) -> Verdict {
    if outcome.memory_exceeded {
        return Verdict::MemoryLimitExceeded;
    }
    if language == Language::Java && outcome.stderr.contains("java.lang.OutOfMemoryError") {
        return Verdict::MemoryLimitExceeded;
    }
    if outcome.timed_out || TIMEOUT_EXIT_CODES.contains(&outcome.exit_code) {
        return Verdict::TimeLimitExceeded;
    }
    if outcome.exit_code != 0 {
        return Verdict::RuntimeError;
    }
    if outputs_match(&outcome.stdout, expected_stdout) {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    }
}
