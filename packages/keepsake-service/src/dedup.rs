use keepsake_storage::{models::SemanticHit, queries};

use crate::{KeepsakeService, Result};

/// Outcome of the duplicate check. The candidate embedding is kept so the write path does not
/// embed the same summary twice.
#[derive(Clone, Debug)]
pub struct DuplicateCheck {
	pub embedding: Vec<f32>,
	pub nearest: Option<SemanticHit>,
	pub is_duplicate: bool,
}

impl KeepsakeService {
	/// Compares `summary` against the user's nearest stored semantic memory. Only a distance
	/// strictly below `memory.dup_distance_threshold` counts as a duplicate.
	pub async fn find_duplicate(&self, user_id: &str, summary: &str) -> Result<DuplicateCheck> {
		let embedding = self.embed_text(summary).await?;
		let hits = queries::nearest_semantic(&self.db.pool, user_id, &embedding, 1).await?;
		let nearest = hits.into_iter().next();
		let threshold = f64::from(self.cfg.memory.dup_distance_threshold);
		let is_duplicate = nearest.as_ref().is_some_and(|hit| hit.distance < threshold);

		if let Some(hit) = nearest.as_ref() {
			tracing::debug!(
				semantic_id = %hit.semantic_id,
				distance = hit.distance,
				is_duplicate,
				"Duplicate check compared against nearest semantic memory."
			);
		}

		Ok(DuplicateCheck { embedding, nearest, is_duplicate })
	}
}
