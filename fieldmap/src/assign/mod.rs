//! Complétion des assignments
//!
//! Un assignment lie une feature à un assigné. États : `Assigned`
//! (`completed = false`) puis `Completed` (`completed = true`). L'unique
//! transition Assigned -> Completed est déclenchée par un événement de
//! complétion dont l'utilisateur correspond à l'assigné ; elle est à sens
//! unique, jamais remise à zéro ici.
//!
//! La transition est conditionnelle côté store (read-modify-write atomique
//! sur l'identité de l'assignment) : des complétions concurrentes du même
//! couple (feature, utilisateur) se sérialisent, le perdant observe
//! `AlreadyCompleted`. Un retry aux résultats octet-à-octet identiques est
//! idempotent, départagé par le hash de contenu stocké.

pub mod memory;
pub mod progress;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Résultats d'un survey : map question -> réponse
pub type SurveyResults = Map<String, Value>;

/// Un assignment tel que stocké par le record store
#[derive(Debug, Clone)]
pub struct Assignment {
    pub feature_id: i64,
    pub assignee_id: i64,
    pub completed: bool,

    /// Résultats stockés verbatim à la complétion
    pub results: Option<SurveyResults>,

    /// Hash de contenu des résultats stockés (identité de complétion)
    pub results_hash: Option<[u8; 32]>,
}

/// Événement transient de complétion d'un survey
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub user_id: i64,
    pub task_id: String,
    pub feature_id: i64,
    pub survey_id: String,
    pub results: SurveyResults,
}

/// Erreurs de la complétion
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Aucun assignment pour ce couple (feature, utilisateur)
    #[error("No assignment for feature {feature_id} and user {user_id}")]
    AssignmentNotFound { feature_id: i64, user_id: i64 },

    /// Payload de résultats invalide
    #[error("Malformed results payload: {0}")]
    ResultsMalformed(String),

    /// Re-complétion avec des résultats différents
    #[error("Assignment for feature {feature_id} already completed with different results")]
    AlreadyCompleted { feature_id: i64 },

    /// Erreur du record store sous-jacent
    #[error("Assignment store error: {0}")]
    Store(String),
}

impl CompletionEvent {
    /// Construit un événement depuis le handoff de complétion : champs de
    /// formulaire `results` (JSON stringifié) et `userId` (entier
    /// stringifié), plus les paramètres de chemin.
    ///
    /// # Errors
    ///
    /// `ResultsMalformed` pour tout payload qui ne se désérialise pas en
    /// map non vide, ou tout identifiant non entier.
    pub fn from_form(
        task_id: &str,
        record_id: &str,
        survey_id: &str,
        results_raw: &str,
        user_id_raw: &str,
    ) -> Result<Self, CompletionError> {
        let feature_id = record_id.trim().parse::<i64>().map_err(|_| {
            CompletionError::ResultsMalformed(format!("recordId is not an integer: {record_id}"))
        })?;
        let user_id = user_id_raw.trim().parse::<i64>().map_err(|_| {
            CompletionError::ResultsMalformed(format!("userId is not an integer: {user_id_raw}"))
        })?;

        let results: Value = serde_json::from_str(results_raw)
            .map_err(|e| CompletionError::ResultsMalformed(e.to_string()))?;
        let Value::Object(results) = results else {
            return Err(CompletionError::ResultsMalformed(
                "results must be a JSON object".into(),
            ));
        };
        if results.is_empty() {
            return Err(CompletionError::ResultsMalformed(
                "results must not be empty".into(),
            ));
        }

        Ok(Self {
            user_id,
            task_id: task_id.to_string(),
            feature_id,
            survey_id: survey_id.to_string(),
            results,
        })
    }

    /// Hash d'identité du payload de résultats
    pub fn results_hash(&self) -> [u8; 32] {
        results_hash(&self.results)
    }
}

/// Hash blake3 de la sérialisation d'une map de résultats.
///
/// `serde_json::Map` trie ses clés : la sérialisation est canonique et
/// deux payloads au contenu identique donnent le même hash.
pub fn results_hash(results: &SurveyResults) -> [u8; 32] {
    let bytes = serde_json::to_vec(results).unwrap_or_default();
    *blake3::hash(&bytes).as_bytes()
}

/// Issue de la primitive conditionnelle du store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// Aucun assignment sous cette identité
    NotFound,

    /// Transition Assigned -> Completed effectuée
    Completed,

    /// Déjà complété ; le hash stocké départage retry et conflit
    AlreadyCompleted { same_results: bool },
}

/// Record store des assignments.
///
/// `complete_if_pending` doit être atomique vis-à-vis des complétions
/// concurrentes de la même identité (update conditionnel sur
/// `completed = false`).
pub trait AssignmentStore {
    /// Cherche l'assignment d'une feature pour un assigné
    fn find(&self, feature_id: i64, assignee_id: i64)
        -> Result<Option<Assignment>, CompletionError>;

    /// Passe l'assignment à complété si et seulement s'il ne l'est pas
    /// encore, en stockant les résultats verbatim et leur hash
    fn complete_if_pending(
        &self,
        feature_id: i64,
        assignee_id: i64,
        results: &SurveyResults,
        results_hash: [u8; 32],
    ) -> Result<CompleteOutcome, CompletionError>;
}

/// Statut d'une complétion réussie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// L'assignment vient d'être complété
    Completed,

    /// Retry identique après succès : aucun effet
    Idempotent,
}

/// Service appliquant les événements de complétion au record store
pub struct AssignmentCompletionService<S> {
    store: S,
}

impl<S: AssignmentStore> AssignmentCompletionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applique un événement de complétion.
    ///
    /// L'opération n'a aucun effet sur l'assignment en cas d'erreur.
    ///
    /// # Errors
    ///
    /// `AssignmentNotFound` si l'utilisateur de l'événement n'est pas
    /// l'assigné de la feature ; `AlreadyCompleted` pour une
    /// re-complétion aux résultats différents.
    pub fn complete(&self, event: &CompletionEvent) -> Result<CompletionStatus, CompletionError> {
        if event.results.is_empty() {
            return Err(CompletionError::ResultsMalformed(
                "results must not be empty".into(),
            ));
        }

        let hash = event.results_hash();
        let outcome =
            self.store
                .complete_if_pending(event.feature_id, event.user_id, &event.results, hash)?;

        match outcome {
            CompleteOutcome::NotFound => Err(CompletionError::AssignmentNotFound {
                feature_id: event.feature_id,
                user_id: event.user_id,
            }),
            CompleteOutcome::Completed => {
                info!(
                    feature_id = event.feature_id,
                    user_id = event.user_id,
                    task_id = event.task_id.as_str(),
                    survey_id = event.survey_id.as_str(),
                    results_hash = %hex::encode(hash),
                    "Assignment completed"
                );
                Ok(CompletionStatus::Completed)
            }
            CompleteOutcome::AlreadyCompleted { same_results: true } => {
                debug!(
                    feature_id = event.feature_id,
                    user_id = event.user_id,
                    "Identical completion retry, no-op"
                );
                Ok(CompletionStatus::Idempotent)
            }
            CompleteOutcome::AlreadyCompleted {
                same_results: false,
            } => Err(CompletionError::AlreadyCompleted {
                feature_id: event.feature_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_form() {
        let event = CompletionEvent::from_form(
            "task-3",
            "42",
            "survey-9",
            r#"{"q1": "yes", "q2": 4}"#,
            "7",
        )
        .unwrap();

        assert_eq!(event.feature_id, 42);
        assert_eq!(event.user_id, 7);
        assert_eq!(event.task_id, "task-3");
        assert_eq!(event.survey_id, "survey-9");
        assert_eq!(event.results.get("q1").unwrap(), "yes");
    }

    #[test]
    fn test_event_from_form_rejects_bad_payloads() {
        let malformed = [
            ("42", r#"{"q": 1"#, "7"),   // JSON cassé
            ("42", r#"[1, 2]"#, "7"),    // pas un objet
            ("42", r#"{}"#, "7"),        // vide
            ("42", r#"{"q": 1}"#, "me"), // userId non entier
            ("abc", r#"{"q": 1}"#, "7"), // recordId non entier
        ];

        for (record_id, results, user_id) in malformed {
            let result = CompletionEvent::from_form("t", record_id, "s", results, user_id);
            assert!(
                matches!(result, Err(CompletionError::ResultsMalformed(_))),
                "expected ResultsMalformed for {results}"
            );
        }
    }

    #[test]
    fn test_results_hash_is_content_identity() {
        // Même contenu, ordre de clés différent dans le texte source
        let a = CompletionEvent::from_form("t", "1", "s", r#"{"a": 1, "b": 2}"#, "1").unwrap();
        let b = CompletionEvent::from_form("t", "1", "s", r#"{"b": 2, "a": 1}"#, "1").unwrap();
        assert_eq!(a.results_hash(), b.results_hash());

        let c = CompletionEvent::from_form("t", "1", "s", r#"{"a": 1, "b": 3}"#, "1").unwrap();
        assert_ne!(a.results_hash(), c.results_hash());
    }

    #[test]
    fn test_results_hash_nested() {
        let results: SurveyResults =
            serde_json::from_value(json!({"grid": {"r1": [1, 2], "r2": [3]}})).unwrap();
        let again: SurveyResults =
            serde_json::from_value(json!({"grid": {"r2": [3], "r1": [1, 2]}})).unwrap();
        assert_eq!(results_hash(&results), results_hash(&again));
    }
}
