use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::can_manage;
use crate::models::rating::Rating;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewRating {
    pub to_user_id: Uuid,
    pub score: u8,
    pub comment: Option<String>,
    pub load_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingUpdate {
    pub score: u8,
    pub comment: Option<String>,
}

fn validate_score(score: u8) -> Result<(), AppError> {
    if !(1..=5).contains(&score) {
        return Err(AppError::Validation(
            "score must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

pub fn create(state: &AppState, actor: &User, new_rating: NewRating) -> Result<Rating, AppError> {
    validate_score(new_rating.score)?;

    if new_rating.to_user_id == actor.id {
        return Err(AppError::Validation(
            "cannot rate yourself".to_string(),
        ));
    }

    if !state.users.contains_key(&new_rating.to_user_id) {
        return Err(AppError::NotFound(format!(
            "user {} not found",
            new_rating.to_user_id
        )));
    }

    if let Some(load_id) = new_rating.load_id {
        let duplicate = state.ratings.iter().any(|entry| {
            let rating = entry.value();
            rating.from_user_id == actor.id
                && rating.to_user_id == new_rating.to_user_id
                && rating.load_id == Some(load_id)
        });
        if duplicate {
            return Err(AppError::Conflict(
                "already rated this user for this load".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let rating = Rating {
        id: Uuid::new_v4(),
        from_user_id: actor.id,
        to_user_id: new_rating.to_user_id,
        load_id: new_rating.load_id,
        score: new_rating.score,
        comment: new_rating.comment,
        created_at: now,
        updated_at: now,
    };

    state.ratings.insert(rating.id, rating.clone());
    recompute_aggregate(state, rating.to_user_id);

    Ok(rating)
}

pub fn update(
    state: &AppState,
    actor: &User,
    rating_id: Uuid,
    changes: RatingUpdate,
) -> Result<Rating, AppError> {
    validate_score(changes.score)?;

    let updated = {
        let mut rating = state
            .ratings
            .get_mut(&rating_id)
            .ok_or_else(|| AppError::NotFound(format!("rating {rating_id} not found")))?;

        if rating.from_user_id != actor.id {
            return Err(AppError::Forbidden(
                "only the rating's author can edit it".to_string(),
            ));
        }

        rating.score = changes.score;
        rating.comment = changes.comment;
        rating.updated_at = Utc::now();
        rating.clone()
    };

    recompute_aggregate(state, updated.to_user_id);
    Ok(updated)
}

pub fn delete(state: &AppState, actor: &User, rating_id: Uuid) -> Result<(), AppError> {
    let to_user_id = {
        let rating = state
            .ratings
            .get(&rating_id)
            .ok_or_else(|| AppError::NotFound(format!("rating {rating_id} not found")))?;

        if !can_manage(actor, rating.from_user_id) {
            return Err(AppError::Forbidden(
                "only the rating's author can delete it".to_string(),
            ));
        }

        rating.to_user_id
    };

    state.ratings.remove(&rating_id);
    recompute_aggregate(state, to_user_id);
    Ok(())
}

pub fn list_for_user(state: &AppState, user_id: Uuid) -> Vec<Rating> {
    let mut ratings: Vec<Rating> = state
        .ratings
        .iter()
        .filter(|entry| entry.value().to_user_id == user_id)
        .map(|entry| entry.value().clone())
        .collect();

    ratings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    ratings
}

/// Eager O(n) recomputation over the user's ratings. Fine at this scale; an
/// incremental running average would replace this if rating volume grew.
fn recompute_aggregate(state: &AppState, user_id: Uuid) {
    let scores: Vec<u8> = state
        .ratings
        .iter()
        .filter(|entry| entry.value().to_user_id == user_id)
        .map(|entry| entry.value().score)
        .collect();

    if let Some(mut user) = state.users.get_mut(&user_id) {
        user.total_ratings = scores.len() as u32;
        user.rating = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64
        };
    }
}
