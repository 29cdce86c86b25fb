//! Supplier (pemasok) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A supplier of raw materials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Supplier with its count of completed procurements, used to pick a default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierCandidate {
    pub id: Uuid,
    pub name: String,
    pub completed_procurements: i64,
}

/// Pick the supplier with the most completed procurement history.
/// Ties go to the alphabetically first name so the choice is stable.
pub fn pick_default_supplier(candidates: &[SupplierCandidate]) -> Option<&SupplierCandidate> {
    candidates.iter().min_by(|a, b| {
        b.completed_procurements
            .cmp(&a.completed_procurements)
            .then_with(|| a.name.cmp(&b.name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, completed: i64) -> SupplierCandidate {
        SupplierCandidate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            completed_procurements: completed,
        }
    }

    #[test]
    fn test_pick_default_supplier_by_history() {
        let candidates = vec![candidate("CV Maju", 3), candidate("PT Sumber", 8), candidate("UD Jaya", 1)];
        assert_eq!(pick_default_supplier(&candidates).unwrap().name, "PT Sumber");
    }

    #[test]
    fn test_pick_default_supplier_tie_break() {
        let candidates = vec![candidate("UD Jaya", 2), candidate("CV Maju", 2)];
        assert_eq!(pick_default_supplier(&candidates).unwrap().name, "CV Maju");
    }

    #[test]
    fn test_pick_default_supplier_none() {
        assert!(pick_default_supplier(&[]).is_none());
    }
}
