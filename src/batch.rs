//! Best-effort batch analysis over a list of companies.
//!
//! Every entry is attempted in input order and produces exactly one
//! [`AnalysisResult`]; a failing entry never stops the ones after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::{AnalysisClient, AnalysisResult};
use crate::error::{json_type_name, AnalysisError, MalformedInputError};
use crate::prompt::{PromptTemplate, COMPANY_PLACEHOLDER};

/// One item of batch input: a bare name or a record with a `name` field.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanyEntry {
    Name(String),
    Record {
        name: String,
        extra: serde_json::Map<String, Value>,
    },
}

impl CompanyEntry {
    pub fn from_value(index: usize, value: &Value) -> Result<Self, MalformedInputError> {
        match value {
            Value::String(name) => Ok(CompanyEntry::Name(name.clone())),
            Value::Object(map) => match map.get("name") {
                Some(Value::String(name)) => {
                    let mut extra = map.clone();
                    extra.remove("name");
                    Ok(CompanyEntry::Record {
                        name: name.clone(),
                        extra,
                    })
                }
                _ => Err(unusable(index, value)),
            },
            _ => Err(unusable(index, value)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CompanyEntry::Name(name) => name,
            CompanyEntry::Record { name, .. } => name,
        }
    }
}

fn unusable(index: usize, value: &Value) -> MalformedInputError {
    MalformedInputError::UnusableEntry {
        index,
        raw: value.to_string(),
    }
}

/// Parses an uploaded batch file. The document must be a JSON array; its
/// elements are validated one by one while the batch runs.
pub fn parse_batch_input(content: &str) -> Result<Vec<Value>, MalformedInputError> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| MalformedInputError::InvalidJson(e.to_string()))?;
    match document {
        Value::Array(items) => Ok(items),
        other => Err(MalformedInputError::NotAnArray(json_type_name(&other))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl EntryState {
    pub fn can_transition_to(self, next: EntryState) -> bool {
        matches!(
            (self, next),
            (EntryState::Pending, EntryState::InFlight)
                | (EntryState::InFlight, EntryState::Succeeded)
                | (EntryState::InFlight, EntryState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EntryState::Succeeded | EntryState::Failed)
    }
}

/// Per-entry states of a running batch.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    states: Vec<EntryState>,
}

impl BatchTracker {
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![EntryState::Pending; len],
        }
    }

    /// Moves entry `index` to `next`. Returns false and leaves the state
    /// untouched when the transition is not allowed.
    pub fn advance(&mut self, index: usize, next: EntryState) -> bool {
        match self.states.get_mut(index) {
            Some(state) if state.can_transition_to(next) => {
                *state = next;
                true
            }
            Some(state) => {
                log::error!(
                    "Rejected transition for entry {} from {:?} to {:?}",
                    index,
                    state,
                    next
                );
                false
            }
            None => false,
        }
    }

    pub fn state(&self, index: usize) -> Option<EntryState> {
        self.states.get(index).copied()
    }

    pub fn completed(&self) -> usize {
        self.states.iter().filter(|s| s.is_terminal()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|s| s.is_terminal())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_companies: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<AnalysisResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<AnalysisResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            batch_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            total_companies: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

pub struct BatchRunner<'a> {
    client: &'a AnalysisClient,
    template: &'a PromptTemplate,
}

impl<'a> BatchRunner<'a> {
    pub fn new(client: &'a AnalysisClient, template: &'a PromptTemplate) -> Self {
        Self { client, template }
    }

    pub async fn run(&self, entries: &[Value]) -> BatchReport {
        self.run_with_progress(entries, |_| {}).await
    }

    pub async fn run_with_progress<F>(&self, entries: &[Value], mut on_progress: F) -> BatchReport
    where
        F: FnMut(BatchProgress),
    {
        log::info!("Starting batch of {} companies", entries.len());
        if !self.template.has_placeholder() {
            log::warn!(
                "Prompt template has no {} placeholder; every entry gets the same prompt",
                COMPANY_PLACEHOLDER
            );
        }
        let mut tracker = BatchTracker::new(entries.len());
        let mut results = Vec::with_capacity(entries.len());

        for (index, raw) in entries.iter().enumerate() {
            tracker.advance(index, EntryState::InFlight);

            let result = match self.attempt(index, raw).await {
                Ok((company, text)) => {
                    tracker.advance(index, EntryState::Succeeded);
                    AnalysisResult::success(company, text)
                }
                Err((company, err)) => {
                    log::warn!("Entry {} ({}) failed: {}", index, company, err);
                    tracker.advance(index, EntryState::Failed);
                    AnalysisResult::failure(company, err)
                }
            };
            results.push(result);

            on_progress(BatchProgress {
                completed: tracker.completed(),
                total: entries.len(),
            });
        }

        debug_assert!(tracker.is_complete());
        let report = BatchReport::from_results(results);
        log::info!(
            "Batch {} finished: {} succeeded, {} failed",
            report.batch_id,
            report.succeeded,
            report.failed
        );
        report
    }

    /// One entry, captured on its own so its failure is returned rather than
    /// propagated.
    async fn attempt(
        &self,
        index: usize,
        raw: &Value,
    ) -> Result<(String, String), (String, AnalysisError)> {
        let entry = CompanyEntry::from_value(index, raw)
            .map_err(|e| (raw.to_string(), AnalysisError::from(e)))?;
        let company = entry.name().to_string();
        let prompt = self.template.render(&company);

        match self.client.analyze(&prompt).await {
            Ok(text) => Ok((company, text)),
            Err(e) => Err((company, e.into())),
        }
    }
}
