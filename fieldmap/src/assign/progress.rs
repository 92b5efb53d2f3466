//! Comptes d'avancement d'un utilisateur sur une couche

use serde::Serialize;

use super::Assignment;

/// Avancement d'un utilisateur : assignments reçus et complétés
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayerProgress {
    pub assigned: usize,
    pub completed: usize,
}

/// Compte les assignments d'un utilisateur parmi ceux d'une couche
pub fn layer_progress(assignments: &[Assignment], user_id: i64) -> LayerProgress {
    let mut progress = LayerProgress::default();

    for assignment in assignments.iter().filter(|a| a.assignee_id == user_id) {
        progress.assigned += 1;
        if assignment.completed {
            progress.completed += 1;
        }
    }

    progress
}
