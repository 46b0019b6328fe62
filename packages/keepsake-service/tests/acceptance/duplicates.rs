use std::sync::Arc;

use keepsake_service::{AskRequest, AskRoute, respond::DUPLICATE_ANSWER};

use super::{
	ScriptedCompletion, StubTranscription, USER, count_rows, echo_seattle, scripted_service,
	test_db,
};

const TABLES: [&str; 5] =
	["raw_memories", "chunks", "semantic_memories", "entity_memories", "memory_tags"];

async fn snapshot(pool: &sqlx::PgPool) -> Vec<i64> {
	let mut counts = Vec::with_capacity(TABLES.len());

	for table in TABLES {
		counts.push(count_rows(pool, table).await);
	}

	counts
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn duplicate_save_performs_no_writes() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping duplicate_save_performs_no_writes; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let summary = "The user adopted a cat named Miso.";
	let completion = Arc::new(
		ScriptedCompletion::new(echo_seattle)
			.save("I adopted a cat named Miso.", summary, &["Miso"], &["pets"])
			.save("Guess what, I adopted a cat called Miso!", summary, &["Miso"], &["pets"]),
	);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let first = service
		.ask(AskRequest {
			user_id: USER.to_string(),
			query: "I adopted a cat named Miso.".to_string(),
		})
		.await
		.expect("First save failed.");

	assert_eq!(first.route, AskRoute::Saved);

	let before = snapshot(&service.db.pool).await;
	let entity_before = sqlx::query_scalar::<_, i32>(
		"SELECT observation_count FROM entity_memories WHERE user_id = $1 AND name = 'Miso'",
	)
	.bind(USER)
	.fetch_one(&service.db.pool)
	.await
	.expect("Failed to load entity.");
	let second = service
		.ask(AskRequest {
			user_id: USER.to_string(),
			query: "Guess what, I adopted a cat called Miso!".to_string(),
		})
		.await
		.expect("Duplicate check failed.");

	assert_eq!(second.route, AskRoute::Duplicate);
	assert_eq!(second.answer, DUPLICATE_ANSWER);
	assert_eq!(snapshot(&service.db.pool).await, before);

	let entity_after = sqlx::query_scalar::<_, i32>(
		"SELECT observation_count FROM entity_memories WHERE user_id = $1 AND name = 'Miso'",
	)
	.bind(USER)
	.fetch_one(&service.db.pool)
	.await
	.expect("Failed to load entity.");

	assert_eq!(entity_before, 1);
	assert_eq!(entity_after, entity_before);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn duplicate_check_is_scoped_to_the_user() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping duplicate_check_is_scoped_to_the_user; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).save(
		"I ran the Chicago marathon.",
		"The user ran the Chicago marathon.",
		&["Chicago"],
		&["running"],
	));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;

	for user_id in ["runner-a", "runner-b"] {
		let response = service
			.ask(AskRequest {
				user_id: user_id.to_string(),
				query: "I ran the Chicago marathon.".to_string(),
			})
			.await
			.expect("Save failed.");

		assert_eq!(response.route, AskRoute::Saved);
	}

	assert_eq!(count_rows(&service.db.pool, "semantic_memories").await, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
