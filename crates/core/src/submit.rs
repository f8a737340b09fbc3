use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{DishId, RestaurantId, UserId};
use crate::value::RankingValue;

/// One ranking submission: a diner's assessment of one dish at one
/// restaurant. The value is a sum type, so "both rank and taste status"
/// and "neither" are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRanking {
    pub user_id: UserId,
    pub dish_id: DishId,
    pub restaurant_id: RestaurantId,
    /// Grouping key scoping the One-Best rule (e.g. "noodle", "dessert").
    pub dish_type: String,
    pub value: RankingValue,
    pub notes: String,
    pub photo_refs: Vec<String>,
}

impl SubmitRanking {
    /// Check every precondition before any store access. A failure here
    /// means nothing has been written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dish_type.trim().is_empty() {
            return Err(ValidationError::BlankDishType);
        }
        if self.notes.trim().is_empty() {
            return Err(ValidationError::BlankNotes);
        }
        if self.photo_refs.is_empty() {
            return Err(ValidationError::NoPhotoRefs);
        }
        if self.photo_refs.iter().any(|r| r.trim().is_empty()) {
            return Err(ValidationError::BlankPhotoRef);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmitRanking {
        SubmitRanking {
            user_id: UserId::new(),
            dish_id: DishId::new(),
            restaurant_id: RestaurantId::new(),
            dish_type: "noodle".into(),
            value: RankingValue::numeric(3).unwrap(),
            notes: "great broth".into(),
            photo_refs: vec!["photos/abc123.jpg".into()],
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn blank_notes_rejected() {
        let mut req = request();
        req.notes = "   ".into();
        assert_eq!(req.validate(), Err(ValidationError::BlankNotes));
    }

    #[test]
    fn empty_photo_refs_rejected() {
        let mut req = request();
        req.photo_refs.clear();
        assert_eq!(req.validate(), Err(ValidationError::NoPhotoRefs));
    }

    #[test]
    fn blank_photo_ref_rejected() {
        let mut req = request();
        req.photo_refs.push(String::new());
        assert_eq!(req.validate(), Err(ValidationError::BlankPhotoRef));
    }

    #[test]
    fn blank_dish_type_rejected() {
        let mut req = request();
        req.dish_type = String::new();
        assert_eq!(req.validate(), Err(ValidationError::BlankDishType));
    }
}
