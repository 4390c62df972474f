//! Shared request-body validation (§8, boundaries): every failure maps to
//! `LoreError::Validation`, which the error envelope renders as
//! `validation_error` (422).

use lore_core::{LoreError, Result, EMBEDDING_DIM};

pub fn embedding(vec: &Option<Vec<f32>>) -> Result<()> {
    match vec {
        Some(v) if v.len() != EMBEDDING_DIM => {
            Err(LoreError::validation(format!("embedding must have {EMBEDDING_DIM} dimensions, got {}", v.len())))
        }
        _ => Ok(()),
    }
}

pub fn confidence(value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LoreError::validation("confidence must be between 0 and 1"))
    }
}

pub fn list_limit(limit: i64) -> Result<()> {
    if (1..=200).contains(&limit) {
        Ok(())
    } else {
        Err(LoreError::validation("limit must be between 1 and 200"))
    }
}

pub fn search_limit(limit: i64) -> Result<()> {
    if (1..=50).contains(&limit) {
        Ok(())
    } else {
        Err(LoreError::validation("limit must be between 1 and 50"))
    }
}

pub fn vote_delta(delta: i64) -> Result<()> {
    if delta == 1 || delta == -1 {
        Ok(())
    } else {
        Err(LoreError::validation("delta must be +1 or -1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_rejects_wrong_dimensionality() {
        assert!(embedding(&Some(vec![0.0; 10])).is_err());
        assert!(embedding(&Some(vec![0.0; EMBEDDING_DIM])).is_ok());
        assert!(embedding(&None).is_ok());
    }

    #[test]
    fn confidence_must_be_unit_interval() {
        assert!(confidence(0.0).is_ok());
        assert!(confidence(1.0).is_ok());
        assert!(confidence(-0.1).is_err());
        assert!(confidence(1.1).is_err());
    }

    #[test]
    fn list_limit_allows_up_to_two_hundred() {
        assert!(list_limit(200).is_ok());
        assert!(list_limit(201).is_err());
        assert!(list_limit(0).is_err());
    }

    #[test]
    fn search_limit_allows_up_to_fifty() {
        assert!(search_limit(50).is_ok());
        assert!(search_limit(51).is_err());
    }
}
