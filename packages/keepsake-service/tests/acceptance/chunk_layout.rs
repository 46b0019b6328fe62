use std::sync::Arc;

use keepsake_chunking::Chunk;
use keepsake_service::SaveMemoryRequest;

use super::{ScriptedCompletion, StubTranscription, USER, echo_seattle, scripted_service, test_db};

const JOURNAL: &str = "We drove up the coast on Saturday morning. The fog lifted around ten and \
the water turned bright green near the cliffs. Mia found a tide pool full of anemones and \
refused to leave. We ate fish tacos at a stand by the harbor. On the way home the car made a \
rattling noise that turned out to be a loose heat shield. It was the best day of the summer.";

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn chunks_cover_the_archived_text_in_order() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping chunks_cover_the_archived_text_in_order; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let memory_id = service
		.save_memory(
			SaveMemoryRequest {
				user_id: USER.to_string(),
				text: JOURNAL.to_string(),
				summary: "The user drove up the coast with Mia and visited tide pools.".to_string(),
				entities: vec!["Mia".to_string()],
				tags: vec!["Travel".to_string(), "travel".to_string(), "family".to_string()],
			},
			None,
		)
		.await
		.expect("Save failed.");
	let rows = service.memory_chunks(USER, memory_id).await.expect("Failed to list chunks.");

	assert!(rows.len() > 1, "Text should span several chunks.");

	let mut chunks = Vec::with_capacity(rows.len());

	for (expected_index, row) in rows.iter().enumerate() {
		let start = row.start_offset.expect("Text chunks carry offsets.") as usize;
		let end = row.end_offset.expect("Text chunks carry offsets.") as usize;

		assert_eq!(row.chunk_index, expected_index as i32);
		assert_eq!(&JOURNAL[start..end], row.content);
		assert_eq!(row.memory_id, Some(memory_id));
		assert_eq!(row.document_id, None);

		chunks.push(Chunk {
			chunk_index: row.chunk_index,
			start_offset: start,
			end_offset: end,
			text: row.content.clone(),
		});
	}

	assert_eq!(chunks.first().map(|chunk| chunk.start_offset), Some(0));
	assert_eq!(chunks.last().map(|chunk| chunk.end_offset), Some(JOURNAL.len()));
	assert_eq!(keepsake_chunking::reassemble(&chunks), JOURNAL);

	let archived = service.memory_text(USER, memory_id).await.expect("Failed to read text.");

	assert_eq!(archived, JOURNAL);

	let detail = service.get_memory(USER, memory_id).await.expect("Failed to load memory.");
	let semantic = detail.semantic.expect("Semantic layer should exist.");

	assert_eq!(semantic.keywords, vec!["travel".to_string(), "family".to_string()]);
	assert_eq!(semantic.emotion_weight, Some(3));
	assert_eq!(detail.memory.status, "completed");
	assert_eq!(detail.memory.people, vec!["Mia".to_string()]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
