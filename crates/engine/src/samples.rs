//! Built-in example workflows.

/// A workflow described the way a user would type it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleWorkflow {
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub tasks: &'static [&'static str],
}

pub const SAMPLE_WORKFLOWS: [SampleWorkflow; 3] = [
    SampleWorkflow {
        name: "Data Processing Pipeline",
        description: "Upload, validate, analyse and report on a dataset",
        category: "data_processing",
        tasks: &[
            "data input and validation",
            "ai-powered data analysis",
            "report generation",
            "output formatting",
        ],
    },
    SampleWorkflow {
        name: "AI Content Generator",
        description: "Draft, review and publish content with AI assistance",
        category: "content",
        tasks: &[
            "content input",
            "ai content generation",
            "quality review",
            "publication",
        ],
    },
    SampleWorkflow {
        name: "Automated Testing Suite",
        description: "Configure, run and analyse an automated test run",
        category: "testing",
        tasks: &[
            "test configuration",
            "automated testing",
            "result analysis",
            "report generation",
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::infer;
    use crate::models::{slugify, StepType};

    #[test]
    fn samples_have_distinct_ids() {
        let ids: Vec<String> = SAMPLE_WORKFLOWS.iter().map(|s| slugify(s.name)).collect();
        assert_eq!(
            ids,
            vec!["data_processing_pipeline", "ai_content_generator", "automated_testing_suite"]
        );
    }

    #[test]
    fn testing_suite_infers_code_then_llm() {
        let types: Vec<StepType> = SAMPLE_WORKFLOWS[2]
            .tasks
            .iter()
            .map(|t| infer(t).step_type)
            .collect();
        assert_eq!(
            types,
            vec![
                StepType::CodeExecution,
                StepType::CodeExecution,
                StepType::LlmProcessing,
                StepType::LlmProcessing,
            ]
        );
    }
}
