//! The question set used for evaluation.
//!
//! The built-in set is fixed and ordered; reports and metrics from
//! different runs are only comparable because every run asks the same
//! questions in the same order.

use crate::error::{EvaluatorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A question with its known reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCase {
    /// The question sent to the endpoint.
    pub question: String,
    /// The expected answer.
    pub reference_answer: String,
}

impl SampleCase {
    pub fn new(question: impl Into<String>, reference_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            reference_answer: reference_answer.into(),
        }
    }
}

/// An ordered collection of sample cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSet {
    /// Set name.
    pub name: String,
    /// Cases, in evaluation order.
    pub cases: Vec<SampleCase>,
}

impl SampleSet {
    /// Create a new empty set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: Vec::new(),
        }
    }

    /// Add a case to the end of the set.
    pub fn add_case(&mut self, case: SampleCase) {
        self.cases.push(case);
    }

    /// Number of cases in the set.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Get the first `n` cases (`run --limit`).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            cases: self.cases.iter().take(n).cloned().collect(),
        }
    }

    /// Load from a JSON file.
    ///
    /// Expected format:
    /// ```json
    /// {
    ///   "name": "my_questions",
    ///   "cases": [
    ///     { "question": "What is X?", "reference_answer": "X is Y" }
    ///   ]
    /// }
    /// ```
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EvaluatorError::io(path, e))?;
        let set: SampleSet = serde_json::from_str(&content).map_err(|e| {
            EvaluatorError::Serialization(format!("Failed to parse sample set {:?}: {}", path, e))
        })?;
        Ok(set)
    }
}

/// The built-in question set.
pub fn sample_cases() -> SampleSet {
    let mut set = SampleSet::new("builtin");

    set.add_case(SampleCase::new(
        "Who introduced the theory of relativity?",
        "Albert Einstein proposed the theory of relativity, which transformed our understanding of time, space, and gravity.",
    ));
    set.add_case(SampleCase::new(
        "Who was the first computer programmer?",
        "Ada Lovelace is regarded as the first computer programmer for her work on Charles Babbage's early mechanical computer, the Analytical Engine.",
    ));
    set.add_case(SampleCase::new(
        "What did Isaac Newton contribute to science?",
        "Isaac Newton formulated the laws of motion and universal gravitation, laying the foundation for classical mechanics.",
    ));
    set.add_case(SampleCase::new(
        "Who won two Nobel Prizes for research on radioactivity?",
        "Marie Curie was a physicist and chemist who conducted pioneering research on radioactivity and won two Nobel Prizes.",
    ));
    set.add_case(SampleCase::new(
        "What is the theory of evolution by natural selection?",
        "Charles Darwin introduced the theory of evolution by natural selection in his book 'On the Origin of Species'.",
    ));

    set
}
