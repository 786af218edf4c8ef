//! Evaluation service facade.
//!
//! Bridges the HTTP layer and the engine: resolves blob keys into an
//! in-memory [`BatchJob`], runs the batch evaluator on a detached task,
//! and delivers the result to the orchestrator exactly once — on success
//! and on every failure path alike.

use std::sync::Arc;

use tracing::{info, warn};

use cw_core::error::WorkerError;
use cw_core::types::{BatchJob, BatchResult, TestCaseSpec, Verdict};
use cw_core::wire::ExecuteRequest;
use cw_engine::BatchEvaluator;
use cw_engine::batch::fabricate_results;

use crate::blobs::BlobStore;
use crate::callback::OrchestratorClient;

pub struct EvaluationService {
    evaluator: BatchEvaluator,
    blobs: Arc<dyn BlobStore>,
    orchestrator: OrchestratorClient,
}

impl EvaluationService {
    pub fn new(
        evaluator: BatchEvaluator,
        blobs: Arc<dyn BlobStore>,
        orchestrator: OrchestratorClient,
    ) -> Self {
        Self {
            evaluator,
            blobs,
            orchestrator,
        }
    }

    /// Accept a job and evaluate it in the background. The caller can
    /// acknowledge the request as soon as this returns.
    pub fn spawn_evaluation(self: Arc<Self>, request: ExecuteRequest) {
        tokio::spawn(async move {
            let result = self.evaluate_request(&request).await;
            self.orchestrator.submit(&result).await;
        });
    }

    /// Resolve blobs and evaluate. Every failure becomes a BatchResult so
    /// the single callback always fires.
    async fn evaluate_request(&self, request: &ExecuteRequest) -> BatchResult {
        info!(
            submission_id = request.submission_id,
            test_cases = request.test_cases.len(),
            "accepted evaluation request"
        );

        match self.resolve(request).await {
            Ok(job) => self.evaluator.evaluate(&job).await,
            Err(error) => {
                warn!(
                    submission_id = request.submission_id,
                    %error,
                    "blob resolution failed"
                );
                let verdict = if error.is_blob_not_found() {
                    Verdict::FileError
                } else {
                    Verdict::InternalError
                };
                let specs = placeholder_specs(request);
                let message = error.to_string();
                BatchResult {
                    submission_id: request.submission_id,
                    compilation_success: false,
                    compiler_output: message.clone(),
                    test_case_results: fabricate_results(&specs, verdict, &message),
                }
            }
        }
    }

    /// Fetch the source and every test case payload from the blob store.
    async fn resolve(&self, request: &ExecuteRequest) -> Result<BatchJob, WorkerError> {
        let source_code = self.blobs.fetch_text(&request.code_file_path).await?;

        let mut test_cases = Vec::with_capacity(request.test_cases.len());
        for tc in &request.test_cases {
            let stdin = self.blobs.fetch_text(&tc.input_file_path).await?;
            let expected_stdout = self.blobs.fetch_text(&tc.expected_output_file_path).await?;
            test_cases.push(TestCaseSpec {
                test_case_id: tc.test_case_id.clone(),
                stdin,
                expected_stdout,
                time_limit_ms: tc.time_limit_ms,
                max_ram_mb: tc.max_ram_mb,
            });
        }

        Ok(BatchJob {
            language: request.language,
            source_code,
            submission_id: request.submission_id,
            test_cases,
        })
    }
}

/// Specs carrying only ids, for fabricating per-case results when the
/// payloads never arrived.
fn placeholder_specs(request: &ExecuteRequest) -> Vec<TestCaseSpec> {
    request
        .test_cases
        .iter()
        .map(|tc| TestCaseSpec {
            test_case_id: tc.test_case_id.clone(),
            stdin: String::new(),
            expected_stdout: String::new(),
            time_limit_ms: tc.time_limit_ms,
            max_ram_mb: tc.max_ram_mb,
        })
        .collect()
}
