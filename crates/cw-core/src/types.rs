use serde::{Deserialize, Serialize};

/// Language the worker instance evaluates.
///
/// One worker process serves exactly one language; the variant is fixed at
/// startup from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Python,
    Java,
    Rust,
    Go,
}

impl Language {
    /// Returns the configuration-facing name for this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Python => "python",
            Self::Java => "java",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal classification of one test-case run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    FileError,
    InternalError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::WrongAnswer => "WRONG_ANSWER",
            Self::CompileError => "COMPILE_ERROR",
            Self::RuntimeError => "RUNTIME_ERROR",
            Self::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Self::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Self::FileError => "FILE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Legal band for a per-case time limit in milliseconds.
pub const MIN_TIME_LIMIT_MS: u64 = 100;
pub const MAX_TIME_LIMIT_MS: u64 = 10_000;

/// Legal band for a per-case memory limit in megabytes.
pub const MIN_RAM_MB: u64 = 32;
pub const MAX_RAM_MB: u64 = 512;

/// Process-wide ceilings applied on top of every per-case limit.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GlobalLimits {
    /// Hard ceiling in seconds for any per-case time limit.
    pub max_time_sec: u64,
    /// Hard ceiling in megabytes for any per-case memory limit.
    pub max_memory_mb: u64,
}

impl Default for GlobalLimits {
    fn default() -> Self {
        // Wide enough that the per-case band and the compile budgets bind
        // first; operators tighten these in configuration.
        Self {
            max_time_sec: 60,
            max_memory_mb: 4096,
        }
    }
}

impl GlobalLimits {
    /// Clamp a requested per-case time limit into the legal band, then
    /// under the global ceiling.
    pub fn effective_time_ms(&self, requested_ms: u64) -> u64 {
        requested_ms
            .clamp(MIN_TIME_LIMIT_MS, MAX_TIME_LIMIT_MS)
            .min(self.max_time_sec.saturating_mul(1000))
    }

    /// Clamp a requested per-case memory limit into the legal band, then
    /// under the global ceiling.
    pub fn effective_ram_mb(&self, requested_mb: u64) -> u64 {
        requested_mb
            .clamp(MIN_RAM_MB, MAX_RAM_MB)
            .min(self.max_memory_mb)
    }
}

/// One test case: stdin payload, expected stdout, and resource limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCaseSpec {
    pub test_case_id: Option<String>,
    pub stdin: String,
    pub expected_stdout: String,
    pub time_limit_ms: u64,
    pub max_ram_mb: u64,
}

/// One source program plus the ordered test cases to run it against.
#[derive(Clone, Debug)]
pub struct BatchJob {
    pub language: Language,
    pub source_code: String,
    pub submission_id: i64,
    pub test_cases: Vec<TestCaseSpec>,
}

/// Exit-code sentinel: child was killed by the deadline watchdog.
pub const EXIT_KILLED_BY_DEADLINE: i32 = -1;
/// Exit-code sentinel: child was killed by the memory watchdog.
pub const EXIT_KILLED_BY_MEMORY: i32 = -2;
/// Exit-code sentinel: the supervisor could not obtain an exit code.
pub const EXIT_CODE_UNAVAILABLE: i32 = -999;

/// What the process supervisor observed for one child.
///
/// Invariant: `memory_exceeded` and `timed_out` are never both true; when
/// both watchdogs fire, memory wins the attribution race.
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub memory_exceeded: bool,
}

impl ProcessOutcome {
    /// Outcome returned when the child could not be spawned at all.
    pub fn spawn_failure() -> Self {
        Self {
            exit_code: EXIT_CODE_UNAVAILABLE,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            timed_out: false,
            memory_exceeded: false,
        }
    }
}

/// Result for one test case, aligned with its input spec.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case_id: Option<String>,
    pub status: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub memory_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated result for one batch, delivered to the orchestrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub submission_id: i64,
    pub compilation_success: bool,
    pub compiler_output: String,
    pub test_case_results: Vec<TestCaseResult>,
}
