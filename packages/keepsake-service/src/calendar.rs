use std::collections::BTreeMap;

use time::{Date, OffsetDateTime, UtcOffset};

use keepsake_storage::{
	models::{Document, RawMemory},
	queries,
};

use crate::{Error, KeepsakeService, Result, require_user};

const MAX_RANGE_DAYS: i64 = 366;

/// Everything the user recorded on one UTC day.
#[derive(Clone, Debug)]
pub struct CalendarDay {
	pub date: Date,
	/// Newest first.
	pub memories: Vec<RawMemory>,
	/// Newest first.
	pub documents: Vec<Document>,
	pub total_count: usize,
}
impl CalendarDay {
	fn empty(date: Date) -> Self {
		Self { date, memories: Vec::new(), documents: Vec::new(), total_count: 0 }
	}
}

impl KeepsakeService {
	/// Memories dated on `date` (by `memory_date`, else upload time) and documents created that
	/// day. Always returns a day, possibly empty.
	pub async fn memories_on_date(&self, user_id: &str, date: Date) -> Result<CalendarDay> {
		let days = self.memories_in_range(user_id, date, date).await?;

		Ok(days.into_iter().next().unwrap_or_else(|| CalendarDay::empty(date)))
	}

	/// Days in `[start, end]` that have at least one entry, oldest day first.
	pub async fn memories_in_range(
		&self,
		user_id: &str,
		start: Date,
		end: Date,
	) -> Result<Vec<CalendarDay>> {
		let user_id = require_user(user_id)?;
		let (from, to) = day_bounds(start, end)?;
		let memories = queries::raw_memories_between(&self.db.pool, user_id, from, to).await?;
		let documents = queries::documents_between(&self.db.pool, user_id, from, to).await?;

		Ok(group_days(memories, documents))
	}
}

/// Half-open UTC instant range covering every day from `start` through `end`.
fn day_bounds(start: Date, end: Date) -> Result<(OffsetDateTime, OffsetDateTime)> {
	if start > end {
		return Err(Error::InvalidRequest {
			message: "start date must not be after end date.".to_string(),
		});
	}
	if (end - start).whole_days() >= MAX_RANGE_DAYS {
		return Err(Error::InvalidRequest {
			message: format!("A calendar range spans at most {MAX_RANGE_DAYS} days."),
		});
	}

	let Some(after_end) = end.next_day() else {
		return Err(Error::InvalidRequest { message: "end date is out of range.".to_string() });
	};

	Ok((start.midnight().assume_utc(), after_end.midnight().assume_utc()))
}

fn day_of(memory: &RawMemory) -> Date {
	memory.memory_date.unwrap_or(memory.created_at).to_offset(UtcOffset::UTC).date()
}

fn group_days(memories: Vec<RawMemory>, documents: Vec<Document>) -> Vec<CalendarDay> {
	let mut days: BTreeMap<Date, CalendarDay> = BTreeMap::new();

	for memory in memories {
		let date = day_of(&memory);

		days.entry(date).or_insert_with(|| CalendarDay::empty(date)).memories.push(memory);
	}
	for document in documents {
		let date = document.created_at.to_offset(UtcOffset::UTC).date();

		days.entry(date).or_insert_with(|| CalendarDay::empty(date)).documents.push(document);
	}

	days.into_values()
		.map(|mut day| {
			day.total_count = day.memories.len() + day.documents.len();

			day
		})
		.collect()
}
