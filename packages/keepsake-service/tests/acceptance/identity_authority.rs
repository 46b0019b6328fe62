use std::sync::Arc;

use keepsake_service::{AskRequest, AskRoute, Retrieval};

use super::{ScriptedCompletion, StubTranscription, USER, scripted_service, test_db};

/// Models the failure this guard exists for: characterizing the user through another entity.
fn comparative_answer(user_prompt: &str) -> String {
	if user_prompt.contains("Jordan Lee") {
		"You are a lot like Jordan Lee, who designs buildings.".to_string()
	} else {
		"You work as a civil engineer.".to_string()
	}
}

fn ask(query: &str) -> AskRequest {
	AskRequest { user_id: USER.to_string(), query: query.to_string() }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn identity_answers_come_from_the_identity_record() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping identity_answers_come_from_the_identity_record; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(
		ScriptedCompletion::new(comparative_answer)
			.save(
				"I work as a civil engineer.",
				"The user works as a civil engineer.",
				&["USER_SELF"],
				&["work"],
			)
			.save(
				"My friend Jordan Lee is an architect.",
				"Jordan Lee is an architect and a friend of the user.",
				&["Jordan Lee"],
				&["friends"],
			)
			.query("What is my job?"),
	);
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;

	for message in ["I work as a civil engineer.", "My friend Jordan Lee is an architect."] {
		let saved = service.ask(ask(message)).await.expect("Save failed.");

		assert_eq!(saved.route, AskRoute::Saved);
	}

	let Retrieval::Context(context) =
		service.retrieve_context(USER, "What is my job?").await.expect("Retrieval failed.")
	else {
		panic!("Identity query with a stored identity must produce context.");
	};

	assert!(context.identity_query);
	assert!(context.identity.is_some());
	assert!(context.render().starts_with("Identity (authority, highest priority):"));

	let response = service.ask(ask("What is my job?")).await.expect("Query failed.");

	assert_eq!(response.route, AskRoute::Grounded);
	assert!(response.answer.contains("civil engineer"), "Unexpected answer: {}", response.answer);
	assert!(!response.answer.contains("like Jordan"), "Unexpected answer: {}", response.answer);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
