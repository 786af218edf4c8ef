//! Per-language compile/run adapters.
//!
//! A closed set of languages with per-language constants, not trait
//! objects: the dispatch is a match table keyed on [`Language`]. Each
//! language provides the same three capabilities — `write_source`,
//! `compile`, `run_one` — and differs only in file names, invocations,
//! and budgets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use cw_core::types::{GlobalLimits, Language, TestCaseResult, TestCaseSpec, Verdict};
use cw_process::RunSpec;

use crate::verdict::classify;

/// Extra resident-set headroom granted to the JVM on top of the per-case
/// cap, so the RSS watchdog measures the heap (`-Xmx`) rather than the
/// JVM's own fixed overhead.
const JAVA_RSS_HEADROOM_MB: u64 = 64;

/// Grace added to the inner `timeout` wrapper before the supervisor's own
/// deadline fires; keeps the wrapper as the first line of enforcement.
const SUPERVISOR_GRACE_SEC: u64 = 2;

/// Per-language constants: source file name and compile budget.
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    pub source_file: &'static str,
    pub compile_time_sec: u64,
    pub compile_memory_mb: u64,
}

pub fn profile(language: Language) -> &'static LanguageProfile {
    match language {
        Language::C => &LanguageProfile {
            source_file: "solution.c",
            compile_time_sec: 30,
            compile_memory_mb: 4096,
        },
        Language::Python => &LanguageProfile {
            source_file: "solution.py",
            compile_time_sec: 10,
            compile_memory_mb: 128,
        },
        Language::Java => &LanguageProfile {
            source_file: "Solution.java",
            compile_time_sec: 30,
            compile_memory_mb: 2048,
        },
        Language::Rust => &LanguageProfile {
            source_file: "main.rs",
            compile_time_sec: 30,
            compile_memory_mb: 256,
        },
        Language::Go => &LanguageProfile {
            source_file: "main.go",
            compile_time_sec: 30,
            compile_memory_mb: 256,
        },
    }
}

/// What one compile attempt produced.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub ok: bool,
    /// Token `run_one` executes: the executable path for compiled
    /// languages, the script name for Python, the class name for Java.
    pub run_identifier: Option<String>,
    /// Compiler stdout and stderr, concatenated.
    pub compiler_output: String,
    pub artifact_path: Option<PathBuf>,
    /// Compiler exit code; the −999 sentinel means the compiler itself
    /// could not be spawned, which is an internal fault rather than a
    /// rejection of the submission.
    pub exit_code: i32,
}

/// Write the (sanitised) source into the work dir under the language's
/// fixed file name.
pub async fn write_source(language: Language, code: &str, work_dir: &Path) -> Result<PathBuf> {
    let path = work_dir.join(profile(language).source_file);
    let cleaned = sanitize_source(language, code);
    tokio::fs::write(&path, cleaned.as_bytes())
        .await
        .with_context(|| format!("failed to write source file {}", path.display()))?;
    Ok(path)
}

/// Strip artifacts of upstream text handling the toolchains reject: the
/// UTF-8 BOM for Java/Rust/Go, and NUL bytes for Java. Everything is
/// written back as plain UTF-8.
fn sanitize_source(language: Language, code: &str) -> String {
    match language {
        Language::Java => {
            let stripped = code.strip_prefix('\u{feff}').unwrap_or(code);
            stripped.replace('\u{0}', "")
        }
        Language::Rust | Language::Go => {
            code.strip_prefix('\u{feff}').unwrap_or(code).to_string()
        }
        Language::C | Language::Python => code.to_string(),
    }
}

/// Compile (or syntax-check) the written source once per batch.
pub async fn compile(language: Language, work_dir: &Path) -> CompileOutcome {
    let profile = profile(language);
    let (command, args) = compile_invocation(language);

    let outcome = cw_process::run(RunSpec {
        command: command.to_string(),
        args,
        working_dir: work_dir.to_path_buf(),
        stdin: None,
        time_limit_sec: profile.compile_time_sec,
        max_memory_mb: profile.compile_memory_mb,
        // The compile budget is its own ceiling; per-case global limits do
        // not apply to the compiler.
        global: GlobalLimits {
            max_time_sec: profile.compile_time_sec,
            max_memory_mb: profile.compile_memory_mb,
        },
    })
    .await;

    let compiler_output = join_streams(&outcome.stdout, &outcome.stderr);
    let artifact_path = artifact_name(language).map(|name| work_dir.join(name));

    let mut ok = outcome.exit_code == 0;
    if ok && requires_artifact(language) {
        // A zero exit without the artifact on disk still counts as failure.
        ok = artifact_path.as_ref().is_some_and(|p| p.exists());
    }

    debug!(language = %language, ok, exit_code = outcome.exit_code, "compile finished");

    CompileOutcome {
        ok,
        run_identifier: ok.then(|| run_identifier(language).to_string()),
        compiler_output,
        artifact_path: artifact_path.filter(|p| p.exists()),
        exit_code: outcome.exit_code,
    }
}

fn compile_invocation(language: Language) -> (&'static str, Vec<String>) {
    match language {
        Language::C => (
            "gcc",
            to_args(&["solution.c", "-o", "solution", "-O2", "-Wall", "-lm"]),
        ),
        Language::Python => ("python3", to_args(&["-m", "py_compile", "solution.py"])),
        Language::Java => (
            "javac",
            to_args(&["-encoding", "UTF-8", "-d", ".", "Solution.java"]),
        ),
        Language::Rust => ("rustc", to_args(&["main.rs", "-o", "solution_exec"])),
        Language::Go => ("go", to_args(&["build", "-o", "solution_exec", "main.go"])),
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// File the compile step must leave behind, when one is required on disk.
fn artifact_name(language: Language) -> Option<&'static str> {
    match language {
        Language::C => Some("solution"),
        Language::Rust | Language::Go => Some("solution_exec"),
        Language::Java => Some("Solution.class"),
        Language::Python => None,
    }
}

/// Whether compile success additionally requires the artifact on disk.
fn requires_artifact(language: Language) -> bool {
    matches!(language, Language::C | Language::Rust | Language::Go)
}

fn run_identifier(language: Language) -> &'static str {
    match language {
        Language::C => "./solution",
        Language::Python => "solution.py",
        Language::Java => "Solution",
        Language::Rust | Language::Go => "./solution_exec",
    }
}

/// Argv of the actual run, before the `timeout` wrapper is prepended.
fn run_invocation(
    language: Language,
    work_dir: &Path,
    run_identifier: &str,
    ram_mb: u64,
) -> Vec<String> {
    match language {
        Language::C | Language::Rust | Language::Go => vec![run_identifier.to_string()],
        Language::Python => vec!["python3".to_string(), run_identifier.to_string()],
        Language::Java => vec![
            "java".to_string(),
            format!("-Xmx{ram_mb}m"),
            "-cp".to_string(),
            work_dir.display().to_string(),
            run_identifier.to_string(),
        ],
    }
}

/// Run one test case against the compiled artifact.
///
/// The command runs under `timeout --signal=SIGKILL Ns`; the supervisor's
/// own deadline sits two seconds behind so the OS wrapper fires first when
/// both are tripped. Stdin comes from an in-memory buffer.
pub async fn run_one(
    language: Language,
    work_dir: &Path,
    run_identifier: &str,
    case: &TestCaseSpec,
    global: GlobalLimits,
) -> TestCaseResult {
    let time_ms = global.effective_time_ms(case.time_limit_ms);
    let ram_mb = global.effective_ram_mb(case.max_ram_mb);
    let wrapper_sec = (time_ms / 1000).max(1);

    let mut args = vec!["--signal=SIGKILL".to_string(), format!("{wrapper_sec}s")];
    args.extend(run_invocation(language, work_dir, run_identifier, ram_mb));

    let watchdog_ram_mb = if language == Language::Java {
        ram_mb + JAVA_RSS_HEADROOM_MB
    } else {
        ram_mb
    };

    let outcome = cw_process::run(RunSpec {
        command: "timeout".to_string(),
        args,
        working_dir: work_dir.to_path_buf(),
        stdin: (!case.stdin.is_empty()).then(|| case.stdin.clone().into_bytes()),
        time_limit_sec: wrapper_sec + SUPERVISOR_GRACE_SEC,
        max_memory_mb: watchdog_ram_mb,
        global,
    })
    .await;

    let status = classify(language, &outcome, &case.expected_stdout);
    let message = match status {
        Verdict::TimeLimitExceeded => Some(format!("time limit exceeded ({time_ms} ms)")),
        Verdict::MemoryLimitExceeded => Some(format!("memory limit exceeded ({ram_mb} MB)")),
        Verdict::RuntimeError => Some(format!("process exited with code {}", outcome.exit_code)),
        _ => None,
    };

    TestCaseResult {
        test_case_id: case.test_case_id.clone(),
        status,
        stdout: trim_trailing_newlines(&outcome.stdout),
        stderr: trim_trailing_newlines(&outcome.stderr),
        exit_code: outcome.exit_code,
        duration_ms: outcome.duration_ms,
        memory_exceeded: outcome.memory_exceeded,
        message,
    }
}

fn trim_trailing_newlines(text: &str) -> String {
    text.trim_end_matches(['\r', '\n']).to_string()
}

fn join_streams(stdout: &str, stderr: &str) -> String {
    if stdout.is_empty() {
        stderr.to_string()
    } else if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    }
}

/// Binaries a language needs on PATH at runtime.
pub fn required_tools(language: Language) -> &'static [&'static str] {
    match language {
        Language::C => &["gcc", "timeout"],
        Language::Python => &["python3", "timeout"],
        Language::Java => &["javac", "java", "timeout"],
        Language::Rust => &["rustc", "timeout"],
        Language::Go => &["go", "timeout"],
    }
}

/// Probe PATH for the language's toolchain; returns the missing binaries.
pub async fn missing_tools(language: Language) -> Vec<String> {
    let mut missing = Vec::new();
    for tool in required_tools(language) {
        let found = tokio::process::Command::new("which")
            .arg(tool)
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !found {
            missing.push(tool.to_string());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_table() {
        assert_eq!(profile(Language::C).source_file, "solution.c");
        assert_eq!(profile(Language::C).compile_memory_mb, 4096);
        assert_eq!(profile(Language::Python).compile_time_sec, 10);
        assert_eq!(profile(Language::Java).source_file, "Solution.java");
        assert_eq!(profile(Language::Rust).source_file, "main.rs");
        assert_eq!(profile(Language::Go).compile_memory_mb, 256);
    }

    #[test]
    fn test_compile_invocations() {
        let (cmd, args) = compile_invocation(Language::C);
        assert_eq!(cmd, "gcc");
        assert_eq!(args, ["solution.c", "-o", "solution", "-O2", "-Wall", "-lm"]);

        let (cmd, args) = compile_invocation(Language::Java);
        assert_eq!(cmd, "javac");
        assert_eq!(args, ["-encoding", "UTF-8", "-d", ".", "Solution.java"]);

        let (cmd, _) = compile_invocation(Language::Python);
        assert_eq!(cmd, "python3");
    }

    #[test]
    fn test_bom_is_stripped_for_java_rust_go() {
        for lang in [Language::Java, Language::Rust, Language::Go] {
            let cleaned = sanitize_source(lang, "\u{feff}fn main() {}");
            assert!(!cleaned.starts_with('\u{feff}'), "{lang} kept the BOM");
        }
    }

    #[test]
    fn test_bom_is_kept_for_c_and_python() {
        // Only the languages whose toolchains choked historically get the
        // strip; the others pass through untouched.
        assert!(sanitize_source(Language::C, "\u{feff}x").starts_with('\u{feff}'));
        assert!(sanitize_source(Language::Python, "\u{feff}x").starts_with('\u{feff}'));
    }

    #[test]
    fn test_java_nul_bytes_are_removed() {
        let cleaned = sanitize_source(Language::Java, "class\u{0} Solution {}");
        assert_eq!(cleaned, "class Solution {}");
    }

    #[test]
    fn test_java_run_invocation_carries_xmx_and_classpath() {
        let args = run_invocation(Language::Java, Path::new("/work/x"), "Solution", 96);
        assert_eq!(args, ["java", "-Xmx96m", "-cp", "/work/x", "Solution"]);
    }

    #[test]
    fn test_compiled_run_invocation_is_bare_binary() {
        let args = run_invocation(Language::C, Path::new("/w"), "./solution", 64);
        assert_eq!(args, ["./solution"]);
        let args = run_invocation(Language::Go, Path::new("/w"), "./solution_exec", 64);
        assert_eq!(args, ["./solution_exec"]);
    }

    #[test]
    fn test_python_runs_through_interpreter() {
        let args = run_invocation(Language::Python, Path::new("/w"), "solution.py", 64);
        assert_eq!(args, ["python3", "solution.py"]);
    }

    #[test]
    fn test_artifact_rules() {
        assert!(requires_artifact(Language::C));
        assert!(requires_artifact(Language::Rust));
        assert!(requires_artifact(Language::Go));
        assert!(!requires_artifact(Language::Python));
        assert!(!requires_artifact(Language::Java));
        assert_eq!(artifact_name(Language::Python), None);
        assert_eq!(artifact_name(Language::Java), Some("Solution.class"));
    }

    #[test]
    fn test_join_streams() {
        assert_eq!(join_streams("out", ""), "out");
        assert_eq!(join_streams("", "err"), "err");
        assert_eq!(join_streams("out", "err"), "out\nerr");
    }

    #[test]
    fn test_trim_trailing_newlines() {
        assert_eq!(trim_trailing_newlines("42\r\n"), "42");
        assert_eq!(trim_trailing_newlines("42\n\n"), "42");
        assert_eq!(trim_trailing_newlines("4 2"), "4 2");
    }

    #[tokio::test]
    async fn test_write_source_uses_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(Language::C, "int main(){return 0;}", dir.path())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("solution.c"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "int main(){return 0;}");
    }

    #[tokio::test]
    async fn test_write_source_sanitises_java() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(Language::Java, "\u{feff}class Solution{\u{0}}", dir.path())
            .await
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "class Solution{}");
    }
}
