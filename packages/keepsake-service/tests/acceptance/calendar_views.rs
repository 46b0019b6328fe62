use std::sync::Arc;

use time::{
	UtcOffset,
	macros::{date, datetime},
};

use keepsake_service::{CreateTextMemoryRequest, Error, IngestDocumentRequest, MemoryMetadata};

use super::{ScriptedCompletion, StubTranscription, USER, echo_seattle, scripted_service, test_db};

fn text_memory(text: &str, metadata: MemoryMetadata) -> CreateTextMemoryRequest {
	CreateTextMemoryRequest { user_id: USER.to_string(), text: text.to_string(), metadata }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn calendar_days_follow_memory_date_then_upload_time() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping calendar_days_follow_memory_date_then_upload_time; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let recalled = service
		.create_text_memory(text_memory(
			"The night we watched the Perseids from the roof.",
			MemoryMetadata {
				memory_date: Some(datetime!(2019-08-15 23:10 UTC)),
				..Default::default()
			},
		))
		.await
		.expect("Failed to create memory.");
	let planted = text_memory("Planted tomatoes on the balcony.", MemoryMetadata::default());
	let today = service.create_text_memory(planted).await.expect("Failed to create memory.");
	let document = service
		.ingest_document(IngestDocumentRequest {
			user_id: USER.to_string(),
			title: "Garden plan".to_string(),
			content_type: "text/plain".to_string(),
			text: "Tomatoes go in the south box. Basil goes beside them.".to_string(),
		})
		.await
		.expect("Failed to ingest document.");
	let august = service
		.memories_in_range(USER, date!(2019-08-01), date!(2019-08-31))
		.await
		.expect("Failed to load range.");

	assert_eq!(august.len(), 1);
	assert_eq!(august[0].date, date!(2019-08-15));
	assert_eq!(august[0].memories[0].memory_id, recalled.memory_id);
	assert!(august[0].documents.is_empty());
	assert_eq!(august[0].total_count, 1);

	let upload_day = today.created_at.to_offset(UtcOffset::UTC).date();
	let day = service.memories_on_date(USER, upload_day).await.expect("Failed to load day.");

	assert!(day.memories.iter().any(|memory| memory.memory_id == today.memory_id));
	assert!(day.memories.iter().all(|memory| memory.memory_id != recalled.memory_id));

	let document_day = document.created_at.to_offset(UtcOffset::UTC).date();
	let day = service.memories_on_date(USER, document_day).await.expect("Failed to load day.");

	assert!(day.documents.iter().any(|doc| doc.document_id == document.document_id));

	let stranger = service
		.memories_on_date("someone-else", date!(2019-08-15))
		.await
		.expect("Failed to load day.");

	assert_eq!(stranger.total_count, 0);

	let inverted = service.memories_in_range(USER, date!(2019-08-31), date!(2019-08-01)).await;

	assert!(matches!(inverted, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
