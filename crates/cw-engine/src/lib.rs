//! The evaluation engine: output comparison, per-language compile/run
//! adapters, verdict classification, and the batch evaluator that ties
//! them together over one sandbox directory.

pub mod batch;
pub mod compare;
pub mod language;
pub mod verdict;

pub use batch::BatchEvaluator;
