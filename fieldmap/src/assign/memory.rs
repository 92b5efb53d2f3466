//! Record store d'assignments en mémoire
//!
//! Implémentation process-locale du [`AssignmentStore`], utilisée par les
//! tests et les exécutions locales. Le read-modify-write conditionnel se
//! fait entièrement sous le verrou, ce qui donne l'atomicité exigée par la
//! primitive de complétion.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Assignment, AssignmentStore, CompleteOutcome, CompletionError, SurveyResults};

#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    assignments: Mutex<HashMap<(i64, i64), Assignment>>,
}

impl MemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée un assignment en état Assigned
    pub fn assign(&self, feature_id: i64, assignee_id: i64) {
        let mut assignments = self.assignments.lock().unwrap_or_else(|e| e.into_inner());
        assignments.insert(
            (feature_id, assignee_id),
            Assignment {
                feature_id,
                assignee_id,
                completed: false,
                results: None,
                results_hash: None,
            },
        );
    }

    /// Tous les assignments, pour les vues d'avancement
    pub fn all(&self) -> Vec<Assignment> {
        let assignments = self.assignments.lock().unwrap_or_else(|e| e.into_inner());
        assignments.values().cloned().collect()
    }
}

impl AssignmentStore for MemoryAssignmentStore {
    fn find(
        &self,
        feature_id: i64,
        assignee_id: i64,
    ) -> Result<Option<Assignment>, CompletionError> {
        let assignments = self.assignments.lock().unwrap_or_else(|e| e.into_inner());
        Ok(assignments.get(&(feature_id, assignee_id)).cloned())
    }

    fn complete_if_pending(
        &self,
        feature_id: i64,
        assignee_id: i64,
        results: &SurveyResults,
        results_hash: [u8; 32],
    ) -> Result<CompleteOutcome, CompletionError> {
        let mut assignments = self.assignments.lock().unwrap_or_else(|e| e.into_inner());

        let Some(assignment) = assignments.get_mut(&(feature_id, assignee_id)) else {
            return Ok(CompleteOutcome::NotFound);
        };

        if assignment.completed {
            return Ok(CompleteOutcome::AlreadyCompleted {
                same_results: assignment.results_hash == Some(results_hash),
            });
        }

        assignment.completed = true;
        assignment.results = Some(results.clone());
        assignment.results_hash = Some(results_hash);
        Ok(CompleteOutcome::Completed)
    }
}
