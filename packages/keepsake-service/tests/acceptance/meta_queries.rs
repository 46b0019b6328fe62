use std::sync::Arc;

use keepsake_service::{AskRequest, AskRoute, meta::NO_MEMORIES_ANSWER};

use super::{ScriptedCompletion, StubTranscription, USER, echo_seattle, scripted_service, test_db};

const MEMORIES: [(&str, &str, &str); 3] = [
	("I got promoted to team lead.", "The user was promoted to team lead.", "Work"),
	("I started running three times a week.", "The user runs three times a week.", "health"),
	("I booked a trip to Lisbon for May.", "The user booked a trip to Lisbon for May.", "travel"),
];

fn ask(query: &str) -> AskRequest {
	AskRequest { user_id: USER.to_string(), query: query.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn tags_and_recent_memories_are_answered_from_storage() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping tags_and_recent_memories_are_answered_from_storage; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let mut scripted = ScriptedCompletion::new(echo_seattle);

	for (message, summary, tag) in MEMORIES {
		scripted = scripted.save(message, summary, &[], &[tag]);
	}

	let completion = Arc::new(scripted);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;
	let empty = service.ask(ask("List tags")).await.expect("Meta request failed.");

	assert_eq!(empty.route, AskRoute::Meta);
	assert_eq!(empty.answer, NO_MEMORIES_ANSWER);

	for (message, _, _) in MEMORIES {
		let saved = service.ask(ask(message)).await.expect("Save failed.");

		assert_eq!(saved.route, AskRoute::Saved);
	}

	let classifier_calls = completion.calls("classifier");
	let tags = service.ask(ask("List tags")).await.expect("Meta request failed.");

	assert_eq!(tags.route, AskRoute::Meta);
	assert_eq!(tags.answer, "Your tags: health, travel, work.");

	service.create_tag(USER, "Family", Some("#A0C")).await.expect("Failed to create tag.");

	let with_user_tag = service.ask(ask("what tags do I have?")).await.expect("Meta failed.");

	assert_eq!(with_user_tag.answer, "Your tags: Family, health, travel, work.");

	let last = service.ask(ask("Show me my last memory")).await.expect("Meta request failed.");

	assert_eq!(last.route, AskRoute::Meta);
	assert_eq!(last.answer, "Your most recent memory: The user booked a trip to Lisbon for May.");
	assert_eq!(completion.calls("classifier"), classifier_calls);
	assert_eq!(completion.calls("grounded"), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
