//! Completion validation gate.
//!
//! A task may only be declared done after its evidence passes validation.
//! The validator evaluates caller-supplied test tallies against a
//! strictness policy, tracks a per-task retry counter, and returns a
//! structured verdict. Acceptance criteria are caller-attested: they are
//! reported back unchecked, never verified against real state.

use serde::{Deserialize, Serialize};

use crate::core::TaskId;
use crate::error::{Error, Result};
use crate::mlog;
use crate::state::StateHandle;

/// How aggressively test and coverage gaps block completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Any failure or coverage gap blocks.
    Strict,
    /// Unit/integration failures block; end-to-end failures and coverage
    /// gaps only warn.
    #[default]
    Moderate,
    /// Same blocking set as moderate, for callers that want the intent
    /// spelled out.
    Flexible,
}

impl std::fmt::Display for Strictness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strictness::Strict => write!(f, "strict"),
            Strictness::Moderate => write!(f, "moderate"),
            Strictness::Flexible => write!(f, "flexible"),
        }
    }
}

/// Pass/fail/skip counts for one test suite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: u32,
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
}

impl Tally {
    pub fn new(passed: u32, failed: u32) -> Self {
        Self {
            passed,
            failed,
            skipped: 0,
        }
    }
}

/// Test evidence supplied by the caller for validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TestTallies {
    pub unit: Tally,
    pub integration: Tally,
    pub e2e: Tally,
    /// Line coverage percentage, 0-100.
    pub coverage: f64,
}

impl TestTallies {
    fn total(&self) -> u32 {
        self.unit.passed
            + self.unit.failed
            + self.integration.passed
            + self.integration.failed
            + self.e2e.passed
            + self.e2e.failed
    }

    fn total_passed(&self) -> u32 {
        self.unit.passed + self.integration.passed + self.e2e.passed
    }
}

/// Acceptance-criteria report. Criteria are never auto-verified, so
/// `checked` is always zero; the list is echoed for the caller's review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriteriaReport {
    pub checked: usize,
    pub total: usize,
    pub items: Vec<String>,
}

/// Verdict of a single validation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub task: TaskId,
    /// True when the blocker list is empty.
    pub complete: bool,
    /// Mirrors `complete`.
    pub can_merge: bool,
    /// Advisory 0-100 composite. Never gates the decision.
    pub score: u32,
    pub strictness: Strictness,
    pub criteria: CriteriaReport,
    pub tallies: Option<TestTallies>,
    /// Hard-fail reasons.
    pub blockers: Vec<String>,
    /// Soft-fail reasons. Never block.
    pub warnings: Vec<String>,
    /// Non-gating advice.
    pub recommendations: Vec<String>,
    /// Validations run against this task so far, this one included.
    pub retry_count: u32,
}

/// Evaluates task evidence and decides pass/block.
pub struct CompletionValidator {
    state: StateHandle,
    coverage_threshold: f64,
}

impl CompletionValidator {
    pub fn new(state: StateHandle, coverage_threshold: f64) -> Self {
        Self {
            state,
            coverage_threshold,
        }
    }

    /// Validate a task's evidence under the given strictness.
    ///
    /// Increments the task's retry counter; the counter persists for the
    /// life of the session and never resets.
    ///
    /// # Errors
    /// Returns `TaskNotFound` if the id is absent from the store.
    pub async fn validate(
        &self,
        task: TaskId,
        criteria: &[String],
        tallies: Option<TestTallies>,
        documentation: &[String],
        strictness: Strictness,
    ) -> Result<ValidationResult> {
        let retry_count = {
            let mut state = self.state.write().await;
            state
                .increment_retry(task)
                .ok_or_else(|| Error::TaskNotFound(task.to_string()))?
        };

        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        match tallies {
            None => {
                // No evidence at all blocks regardless of strictness.
                blockers.push("no test results supplied".to_string());
            }
            Some(t) => {
                if t.unit.failed > 0 {
                    blockers.push(format!("{} unit test(s) failing", t.unit.failed));
                }
                if t.integration.failed > 0 {
                    blockers
                        .push(format!("{} integration test(s) failing", t.integration.failed));
                }
                if t.e2e.failed > 0 {
                    let msg = format!("{} end-to-end test(s) failing", t.e2e.failed);
                    if strictness == Strictness::Strict {
                        blockers.push(msg);
                    } else {
                        warnings.push(msg);
                    }
                }
                if t.coverage < self.coverage_threshold {
                    let msg = format!(
                        "coverage {:.1}% below {:.0}% threshold",
                        t.coverage, self.coverage_threshold
                    );
                    if strictness == Strictness::Strict {
                        blockers.push(msg);
                    } else {
                        warnings.push(msg);
                    }
                }
                if t.coverage < 70.0 {
                    recommendations.push("improve test coverage".to_string());
                }
            }
        }

        let has_documentation = !documentation.is_empty();
        if !has_documentation {
            recommendations.push("update API docs or README".to_string());
        }

        let score = Self::score(tallies.as_ref(), criteria, has_documentation);
        let complete = blockers.is_empty();

        mlog!(
            "Validation {}: task={} complete={} score={} retries={}",
            strictness,
            task,
            complete,
            score,
            retry_count
        );

        Ok(ValidationResult {
            task,
            complete,
            can_merge: complete,
            score,
            strictness,
            criteria: CriteriaReport {
                checked: 0,
                total: criteria.len(),
                items: criteria.to_vec(),
            },
            tallies,
            blockers,
            warnings,
            recommendations,
            retry_count,
        })
    }

    /// Weighted composite: tests 50, acceptance criteria 30, docs 20.
    fn score(tallies: Option<&TestTallies>, criteria: &[String], has_docs: bool) -> u32 {
        let mut score = 0.0;
        if let Some(t) = tallies {
            let total = t.total();
            if total > 0 {
                score += f64::from(t.total_passed()) / f64::from(total) * 50.0;
            }
        }
        if !criteria.is_empty() {
            score += 30.0;
        }
        if has_docs {
            score += 20.0;
        }
        score.round() as u32
    }
}
