use std::sync::Arc;

use keepsake_domain::entity::{ENTITY_TYPE_MENTION, ENTITY_TYPE_SELF, USER_SELF};
use keepsake_service::SaveMemoryRequest;
use keepsake_storage::queries;

use super::{
	ScriptedCompletion, StubTranscription, USER, count_rows, echo_seattle, scripted_service,
	test_db,
};

fn save_request(text: &str, summary: &str, entities: &[&str]) -> SaveMemoryRequest {
	SaveMemoryRequest {
		user_id: USER.to_string(),
		text: text.to_string(),
		summary: summary.to_string(),
		entities: entities.iter().map(|name| name.to_string()).collect(),
		tags: Vec::new(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn repeated_mentions_accumulate_on_one_entity() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping repeated_mentions_accumulate_on_one_entity; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let memories = [
		("Sam and I went hiking.", "The user went hiking with Sam.", "sam"),
		("Sam taught me to bake bread.", "Sam taught the user to bake bread.", "Sam"),
		("Dinner at Sam's place.", "The user had dinner at Sam's place.", "Sam's"),
	];
	let mut last_seen = None;

	for (text, summary, mention) in memories {
		let req = save_request(text, summary, &[mention]);

		service.save_memory(req, None).await.expect("Save failed.");

		let entity = queries::get_entity(&service.db.pool, USER, "Sam")
			.await
			.expect("Failed to load entity.")
			.expect("Entity should exist after a save.");

		if let Some(previous) = last_seen {
			assert!(entity.last_interaction >= previous);
		}

		last_seen = Some(entity.last_interaction);
	}

	let sam = queries::get_entity(&service.db.pool, USER, "Sam")
		.await
		.expect("Failed to load entity.")
		.expect("Entity should exist.");

	assert_eq!(sam.observation_count, 3);
	assert_eq!(sam.entity_type, ENTITY_TYPE_MENTION);
	assert!(sam.summary.contains("bake bread"));
	assert_eq!(count_rows(&service.db.pool, "entity_memories").await, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn self_references_collapse_into_identity_record() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping self_references_collapse_into_identity_record; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;

	service
		.save_memory(
			save_request("My name is Ava.", "The user's name is Ava.", &["me", "USER_SELF"]),
			None,
		)
		.await
		.expect("Save failed.");

	let identity = queries::get_entity(&service.db.pool, USER, USER_SELF)
		.await
		.expect("Failed to load identity.")
		.expect("Identity should exist.");

	assert_eq!(identity.entity_type, ENTITY_TYPE_SELF);
	assert_eq!(identity.observation_count, 1);

	let people: Vec<String> = sqlx::query_scalar("SELECT unnest(people) FROM raw_memories")
		.fetch_all(&service.db.pool)
		.await
		.expect("Failed to load people.");

	assert!(people.is_empty(), "Identity must not be listed as a person: {people:?}");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn concurrent_first_mentions_create_one_entity() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping concurrent_first_mentions_create_one_entity; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let (first, second) = tokio::join!(
		service.save_memory(
			save_request("Priya started a new job.", "Priya started a new job.", &["Priya"]),
			None,
		),
		service.save_memory(
			save_request("Priya moved to Austin.", "Priya moved to Austin.", &["Priya"]),
			None,
		),
	);

	first.expect("First concurrent save failed.");
	second.expect("Second concurrent save failed.");

	let priya = queries::get_entity(&service.db.pool, USER, "Priya")
		.await
		.expect("Failed to load entity.")
		.expect("Entity should exist.");

	assert_eq!(priya.observation_count, 2);
	assert!(priya.summary.contains("new job"));
	assert!(priya.summary.contains("Austin"));
	assert_eq!(count_rows(&service.db.pool, "entity_memories").await, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn concurrent_saves_naming_entities_in_opposite_order_both_commit() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping concurrent_saves_naming_entities_in_opposite_order_both_commit; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;

	for name in ["Noah", "Zoe"] {
		service
			.save_memory(
				save_request(&format!("I met {name}."), &format!("The user met {name}."), &[name]),
				None,
			)
			.await
			.expect("Seed save failed.");
	}

	for round in 0..5 {
		let (forward, backward) = tokio::join!(
			service.save_memory(
				save_request(
					&format!("Noah and Zoe came over, round {round}."),
					&format!("Noah and Zoe visited the user, round {round}."),
					&["Noah", "Zoe"],
				),
				None,
			),
			service.save_memory(
				save_request(
					&format!("Zoe and Noah cooked dinner, round {round}."),
					&format!("Zoe and Noah cooked dinner with the user, round {round}."),
					&["Zoe", "Noah"],
				),
				None,
			),
		);

		forward.expect("Forward-order save failed.");
		backward.expect("Reverse-order save failed.");
	}

	for name in ["Noah", "Zoe"] {
		let entity = queries::get_entity(&service.db.pool, USER, name)
			.await
			.expect("Failed to load entity.")
			.expect("Entity should exist.");

		assert_eq!(entity.observation_count, 11, "{name}");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
