//! Batch evaluation: one sandbox, one compile, N sequential runs.

use std::path::PathBuf;

use tracing::{info, warn};

use cw_core::types::{
    BatchJob, BatchResult, EXIT_CODE_UNAVAILABLE, GlobalLimits, Language, TestCaseResult,
    TestCaseSpec, Verdict,
};
use cw_resource::sandbox::BatchSandbox;

use crate::language;

/// Evaluates whole batches inside per-batch sandbox subdirectories.
#[derive(Debug, Clone)]
pub struct BatchEvaluator {
    language: Language,
    sandbox_root: PathBuf,
    limits: GlobalLimits,
}

impl BatchEvaluator {
    pub fn new(language: Language, sandbox_root: PathBuf, limits: GlobalLimits) -> Self {
        Self {
            language,
            sandbox_root,
            limits,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Evaluate one batch to completion.
    ///
    /// Never fails: every condition, expected or not, lands in the
    /// returned [`BatchResult`]. The sandbox directory is removed on every
    /// exit path; results are aligned 1:1 and in order with
    /// `job.test_cases`.
    pub async fn evaluate(&self, job: &BatchJob) -> BatchResult {
        info!(
            submission_id = job.submission_id,
            language = %job.language,
            test_cases = job.test_cases.len(),
            "starting batch evaluation"
        );

        let sandbox = match BatchSandbox::create(&self.sandbox_root) {
            Ok(sandbox) => sandbox,
            Err(error) => {
                warn!(submission_id = job.submission_id, %error, "sandbox setup failed");
                return setup_failure(job, &error.to_string());
            }
        };

        if let Err(error) =
            language::write_source(job.language, &job.source_code, sandbox.path()).await
        {
            warn!(submission_id = job.submission_id, %error, "source write failed");
            sandbox.cleanup();
            return setup_failure(job, &error.to_string());
        }

        let compile = language::compile(job.language, sandbox.path()).await;
        if compile.exit_code == EXIT_CODE_UNAVAILABLE {
            // The compiler never ran (spawn failed): an internal fault,
            // not a rejection of the submission.
            warn!(
                submission_id = job.submission_id,
                "compiler could not be spawned"
            );
            sandbox.cleanup();
            return setup_failure(job, "compiler unavailable");
        }
        if !compile.ok {
            info!(
                submission_id = job.submission_id,
                "compilation failed, fabricating per-case results"
            );
            let results = fabricate_results(
                &job.test_cases,
                Verdict::CompileError,
                &compile.compiler_output,
            );
            sandbox.cleanup();
            return BatchResult {
                submission_id: job.submission_id,
                compilation_success: false,
                compiler_output: compile.compiler_output,
                test_case_results: results,
            };
        }

        // `ok == true` guarantees the identifier is present.
        let run_identifier = compile.run_identifier.clone().unwrap_or_default();

        let mut results = Vec::with_capacity(job.test_cases.len());
        for case in &job.test_cases {
            let result = language::run_one(
                job.language,
                sandbox.path(),
                &run_identifier,
                case,
                self.limits,
            )
            .await;
            results.push(result);
        }

        sandbox.cleanup();

        info!(
            submission_id = job.submission_id,
            accepted = results
                .iter()
                .filter(|r| r.status == Verdict::Accepted)
                .count(),
            total = results.len(),
            "batch evaluation finished"
        );

        BatchResult {
            submission_id: job.submission_id,
            compilation_success: true,
            compiler_output: compile.compiler_output,
            test_case_results: results,
        }
    }
}

/// Whole-batch failure before any test case could run.
fn setup_failure(job: &BatchJob, detail: &str) -> BatchResult {
    let message = format!("setup failed: {detail}");
    BatchResult {
        submission_id: job.submission_id,
        compilation_success: false,
        compiler_output: message.clone(),
        test_case_results: fabricate_results(&job.test_cases, Verdict::InternalError, &message),
    }
}

/// Fabricate one result per spec when no run happened, preserving order
/// and ids.
pub fn fabricate_results(
    specs: &[TestCaseSpec],
    status: Verdict,
    message: &str,
) -> Vec<TestCaseResult> {
    specs
        .iter()
        .map(|spec| TestCaseResult {
            test_case_id: spec.test_case_id.clone(),
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: EXIT_CODE_UNAVAILABLE,
            duration_ms: 0,
            memory_exceeded: false,
            message: Some(message.to_string()),
        })
        .collect()
}
