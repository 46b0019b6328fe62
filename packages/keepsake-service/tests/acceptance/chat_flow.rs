use std::sync::Arc;

use keepsake_service::{
	AskRequest, AskRoute,
	respond::{INSUFFICIENT_MEMORY_ANSWER, NAME_NOT_STORED_ANSWER},
};

use super::{
	ScriptedCompletion, StubTranscription, USER, count_rows, echo_seattle, scripted_service,
	test_db,
};

fn ask(query: &str) -> AskRequest {
	AskRequest { user_id: USER.to_string(), query: query.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn casual_messages_never_write() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping casual_messages_never_write; set KEEPSAKE_PG_DSN to run this test.");

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;

	for message in ["hi", "thanks!", "ok", "cool", "good morning"] {
		let response = service.ask(ask(message)).await.expect("Casual message failed.");

		assert_eq!(response.route, AskRoute::Casual);
	}

	assert_eq!(completion.calls("classifier"), 0);
	assert_eq!(count_rows(&service.db.pool, "raw_memories").await, 0);
	assert_eq!(count_rows(&service.db.pool, "semantic_memories").await, 0);
	assert_eq!(count_rows(&service.db.pool, "entity_memories").await, 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn empty_store_answers_insufficient_without_model_call() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping empty_store_answers_insufficient_without_model_call; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(
		ScriptedCompletion::new(echo_seattle).query("Where did I go for my birthday?"),
	);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;
	let response =
		service.ask(ask("Where did I go for my birthday?")).await.expect("Query failed.");

	assert_eq!(response.route, AskRoute::Insufficient);
	assert_eq!(response.answer, INSUFFICIENT_MEMORY_ANSWER);
	assert_eq!(completion.calls("grounded"), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn name_query_without_identity_is_not_guessed() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping name_query_without_identity_is_not_guessed; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(
		ScriptedCompletion::new(echo_seattle)
			.save("My friend Dana lives in Portland.", "Dana lives in Portland.", &["Dana"], &[])
			.query("What is my name?"),
	);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;

	service.ask(ask("My friend Dana lives in Portland.")).await.expect("Save failed.");

	let response = service.ask(ask("What is my name?")).await.expect("Query failed.");

	assert_eq!(response.route, AskRoute::NameNotStored);
	assert_eq!(response.answer, NAME_NOT_STORED_ANSWER);
	assert_eq!(completion.calls("grounded"), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn saved_fact_grounds_later_answer() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping saved_fact_grounds_later_answer; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(
		ScriptedCompletion::new(echo_seattle)
			.save("I live in Seattle.", "The user lives in Seattle.", &["Seattle"], &["home"])
			.query("Where do I live?"),
	);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;
	let saved = service.ask(ask("I live in Seattle.")).await.expect("Save failed.");

	assert_eq!(saved.route, AskRoute::Saved);
	assert!(saved.answer.contains("The user lives in Seattle."));
	assert_eq!(count_rows(&service.db.pool, "raw_memories").await, 1);
	assert_eq!(count_rows(&service.db.pool, "semantic_memories").await, 1);
	assert!(count_rows(&service.db.pool, "chunks").await >= 1);

	let answer = service.ask(ask("Where do I live?")).await.expect("Query failed.");

	assert_eq!(answer.route, AskRoute::Grounded);
	assert!(answer.answer.contains("Seattle"), "Unexpected answer: {}", answer.answer);
	assert_eq!(completion.calls("grounded"), 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
