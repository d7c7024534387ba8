//! Query pipeline
//!
//! Provides:
//! - `QueryStage`, the states a query passes through
//! - `QueryOrchestrator`, which runs them with per-stage timeouts

mod orchestrator;

pub use orchestrator::{QueryOrchestrator, QueryParams, StageTimeouts};

use std::fmt;

/// States of one query, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStage {
    Start,
    ExtractEntities,
    Retrieve,
    Optimize,
    BuildContext,
    GenerateReasoning,
    GenerateAnswer,
    Respond,
}

impl QueryStage {
    pub const ALL: [QueryStage; 8] = [
        QueryStage::Start,
        QueryStage::ExtractEntities,
        QueryStage::Retrieve,
        QueryStage::Optimize,
        QueryStage::BuildContext,
        QueryStage::GenerateReasoning,
        QueryStage::GenerateAnswer,
        QueryStage::Respond,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStage::Start => "start",
            QueryStage::ExtractEntities => "extract_entities",
            QueryStage::Retrieve => "retrieve",
            QueryStage::Optimize => "optimize",
            QueryStage::BuildContext => "build_context",
            QueryStage::GenerateReasoning => "generate_reasoning",
            QueryStage::GenerateAnswer => "generate_answer",
            QueryStage::Respond => "respond",
        }
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
