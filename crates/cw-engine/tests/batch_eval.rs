//! End-to-end batch evaluation against real toolchains.
//!
//! Each test probes PATH for the binaries it needs and returns early when
//! they are absent, so the suite passes on hosts with a partial toolchain.

use cw_core::types::{BatchJob, GlobalLimits, Language, TestCaseSpec, Verdict};
use cw_engine::BatchEvaluator;
use cw_engine::language::missing_tools;

async fn toolchain_available(language: Language) -> bool {
    let missing = missing_tools(language).await;
    if missing.is_empty() {
        return true;
    }
    eprintln!("skipping: missing tools for {language}: {missing:?}");
    false
}

fn evaluator(language: Language, root: &tempfile::TempDir) -> BatchEvaluator {
    BatchEvaluator::new(language, root.path().to_path_buf(), GlobalLimits::default())
}

fn case(stdin: &str, expected: &str, time_limit_ms: u64, max_ram_mb: u64) -> TestCaseSpec {
    TestCaseSpec {
        test_case_id: None,
        stdin: stdin.to_string(),
        expected_stdout: expected.to_string(),
        time_limit_ms,
        max_ram_mb,
    }
}

#[tokio::test]
async fn test_c_accepted() {
    if !toolchain_available(Language::C).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::C,
        source_code: "#include <stdio.h>\nint main(void){printf(\"42\\n\");return 0;}".into(),
        submission_id: 1,
        test_cases: vec![case("", "42\n", 2000, 64)],
    };

    let result = evaluator(Language::C, &root).evaluate(&job).await;
    assert!(result.compilation_success, "{}", result.compiler_output);
    assert_eq!(result.test_case_results[0].status, Verdict::Accepted);
    assert!(result.test_case_results[0].duration_ms < 500);
}

#[tokio::test]
async fn test_c_wrong_answer_keeps_stdout() {
    if !toolchain_available(Language::C).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::C,
        source_code: "#include <stdio.h>\nint main(void){printf(\"42\\n\");return 0;}".into(),
        submission_id: 2,
        test_cases: vec![case("", "43\n", 2000, 64)],
    };

    let result = evaluator(Language::C, &root).evaluate(&job).await;
    assert!(result.compilation_success);
    assert_eq!(result.test_case_results[0].status, Verdict::WrongAnswer);
    assert!(result.test_case_results[0].stdout.contains("42"));
}

#[tokio::test]
async fn test_c_reads_stdin() {
    if !toolchain_available(Language::C).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::C,
        source_code:
            "#include <stdio.h>\nint main(void){int a,b;scanf(\"%d %d\",&a,&b);printf(\"%d\\n\",a+b);return 0;}"
                .into(),
        submission_id: 3,
        test_cases: vec![case("2 3\n", "5\n", 2000, 64), case("10 20\n", "30\n", 2000, 64)],
    };

    let result = evaluator(Language::C, &root).evaluate(&job).await;
    assert!(result.compilation_success);
    assert_eq!(result.test_case_results.len(), 2);
    assert_eq!(result.test_case_results[0].status, Verdict::Accepted);
    assert_eq!(result.test_case_results[1].status, Verdict::Accepted);
}

#[tokio::test]
async fn test_python_time_limit_exceeded() {
    if !toolchain_available(Language::Python).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Python,
        source_code: "while True: pass\n".into(),
        submission_id: 4,
        test_cases: vec![case("", "", 1000, 64)],
    };

    let result = evaluator(Language::Python, &root).evaluate(&job).await;
    assert!(result.compilation_success);
    let tc = &result.test_case_results[0];
    assert_eq!(tc.status, Verdict::TimeLimitExceeded);
    assert!(tc.duration_ms >= 1000, "killed too early: {} ms", tc.duration_ms);
    assert!(tc.duration_ms <= 3000, "killed too late: {} ms", tc.duration_ms);
}

#[tokio::test]
async fn test_python_results_preserve_input_order() {
    if !toolchain_available(Language::Python).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let mut cases = Vec::new();
    for i in 0..4 {
        let mut c = case(&format!("{i}\n"), &format!("{i}\n"), 2000, 64);
        c.test_case_id = Some(format!("tc-{i}"));
        cases.push(c);
    }
    let job = BatchJob {
        language: Language::Python,
        source_code: "print(input())\n".into(),
        submission_id: 5,
        test_cases: cases,
    };

    let result = evaluator(Language::Python, &root).evaluate(&job).await;
    assert!(result.compilation_success);
    assert_eq!(result.test_case_results.len(), 4);
    for (i, tc) in result.test_case_results.iter().enumerate() {
        assert_eq!(tc.test_case_id.as_deref(), Some(format!("tc-{i}").as_str()));
        assert_eq!(tc.status, Verdict::Accepted);
    }
}

#[tokio::test]
async fn test_python_syntax_error_is_compile_error() {
    if !toolchain_available(Language::Python).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Python,
        source_code: "def broken(:\n".into(),
        submission_id: 6,
        test_cases: vec![case("", "", 1000, 64), case("", "", 1000, 64)],
    };

    let result = evaluator(Language::Python, &root).evaluate(&job).await;
    assert!(!result.compilation_success);
    assert!(!result.compiler_output.is_empty());
    assert_eq!(result.test_case_results.len(), 2);
    for tc in &result.test_case_results {
        assert_eq!(tc.status, Verdict::CompileError);
        assert!(tc.message.is_some());
    }
}

#[tokio::test]
async fn test_python_runtime_error() {
    if !toolchain_available(Language::Python).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Python,
        source_code: "import sys\nprint('boom', file=sys.stderr)\nsys.exit(3)\n".into(),
        submission_id: 7,
        test_cases: vec![case("", "", 2000, 64)],
    };

    let result = evaluator(Language::Python, &root).evaluate(&job).await;
    let tc = &result.test_case_results[0];
    assert_eq!(tc.status, Verdict::RuntimeError);
    assert!(tc.stderr.contains("boom"));
    assert_eq!(tc.exit_code, 3);
}

#[tokio::test]
async fn test_rust_compile_error() {
    if !toolchain_available(Language::Rust).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Rust,
        source_code: "fn main( { }\n".into(),
        submission_id: 8,
        test_cases: vec![case("", "", 1000, 64)],
    };

    let result = evaluator(Language::Rust, &root).evaluate(&job).await;
    assert!(!result.compilation_success);
    assert!(!result.compiler_output.is_empty());
    assert_eq!(result.test_case_results.len(), 1);
    assert_eq!(result.test_case_results[0].status, Verdict::CompileError);
}

#[tokio::test]
async fn test_go_runtime_error_panic() {
    if !toolchain_available(Language::Go).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Go,
        source_code: "package main\n\nfunc main() {\n\tpanic(\"boom\")\n}\n".into(),
        submission_id: 9,
        test_cases: vec![case("", "", 2000, 64)],
    };

    let result = evaluator(Language::Go, &root).evaluate(&job).await;
    assert!(result.compilation_success, "{}", result.compiler_output);
    let tc = &result.test_case_results[0];
    assert_eq!(tc.status, Verdict::RuntimeError);
    assert!(tc.stderr.contains("boom"));
    assert_ne!(tc.exit_code, 0);
    assert!(tc.exit_code > 0, "panic must not look like a watchdog kill");
}

#[tokio::test]
async fn test_java_memory_limit() {
    if !toolchain_available(Language::Java).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Java,
        source_code: concat!(
            "public class Solution {\n",
            "    public static void main(String[] args) {\n",
            "        long[] hog = new long[64 * 1024 * 1024];\n",
            "        System.out.println(hog.length);\n",
            "    }\n",
            "}\n"
        )
        .into(),
        submission_id: 10,
        test_cases: vec![case("", "", 5000, 64)],
    };

    let result = evaluator(Language::Java, &root).evaluate(&job).await;
    assert!(result.compilation_success, "{}", result.compiler_output);
    assert_eq!(
        result.test_case_results[0].status,
        Verdict::MemoryLimitExceeded
    );
}

#[tokio::test]
async fn test_sandbox_directory_is_removed_after_batch() {
    if !toolchain_available(Language::Python).await {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let job = BatchJob {
        language: Language::Python,
        source_code: "print(1)\n".into(),
        submission_id: 11,
        test_cases: vec![case("", "1\n", 1000, 64)],
    };

    let result = evaluator(Language::Python, &root).evaluate(&job).await;
    assert!(result.compilation_success);
    let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "sandbox subdirectory leaked");
}
