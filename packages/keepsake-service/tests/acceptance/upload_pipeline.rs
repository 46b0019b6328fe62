use std::sync::{Arc, atomic::Ordering};

use keepsake_domain::media::ProcessingStatus;
use keepsake_service::{
	CreateTextMemoryRequest, Error, MemoryMetadata, RegisterUploadRequest, SaveFromUploadRequest,
	TranscriptFormat,
};

use super::{
	ScriptedCompletion, StubTranscription, USER, count_rows, echo_seattle, scripted_service,
	test_db,
};

const SNAPSHOT: &str = "The user described a weekend trip to the Olympic Peninsula with Mia.";
const SPOKEN: &str =
	"This weekend Mia and I drove out to the Olympic Peninsula and camped by the river";

fn upload(filename: &str, content_type: &str) -> RegisterUploadRequest {
	RegisterUploadRequest {
		user_id: USER.to_string(),
		filename: filename.to_string(),
		content_type: Some(content_type.to_string()),
		bytes: b"\x00\x01binary media".to_vec(),
		metadata: MemoryMetadata {
			mood: Some(4),
			people: vec!["Mia".to_string()],
			..Default::default()
		},
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn text_memory_is_claimed_and_processed_once() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping text_memory_is_claimed_and_processed_once; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).with_distill(SNAPSHOT));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion.clone(), transcription).await;
	let tag = service.create_tag(USER, "Trips", None).await.expect("Failed to create tag.");
	let registered = service
		.create_text_memory(CreateTextMemoryRequest {
			user_id: USER.to_string(),
			text: "Mia and I camped by the Hoh river this weekend.".to_string(),
			metadata: MemoryMetadata { tag_ids: vec![tag.tag_id], ..Default::default() },
		})
		.await
		.expect("Failed to register text memory.");

	assert_eq!(registered.status, ProcessingStatus::Pending.as_str());
	assert_eq!(count_rows(&service.db.pool, "semantic_memories").await, 0);

	let claimed = service
		.claim_next_pending()
		.await
		.expect("Claim failed.")
		.expect("A pending memory should be claimable.");

	assert_eq!(claimed.memory_id, registered.memory_id);
	assert_eq!(claimed.status, ProcessingStatus::Processing.as_str());
	assert!(service.claim_next_pending().await.expect("Claim failed.").is_none());

	service.process_memory(claimed.memory_id).await.expect("Processing failed.");
	service.process_memory(claimed.memory_id).await.expect("Reprocessing failed.");

	let detail =
		service.get_memory(USER, registered.memory_id).await.expect("Failed to load memory.");
	let semantic = detail.semantic.expect("Semantic layer should exist.");

	assert_eq!(detail.memory.status, ProcessingStatus::Completed.as_str());
	assert_eq!(semantic.content, SNAPSHOT);
	assert_eq!(semantic.keywords, vec!["trips".to_string()]);
	assert_eq!(detail.tags.len(), 1);
	assert_eq!(completion.calls("distill"), 1);
	assert_eq!(count_rows(&service.db.pool, "semantic_memories").await, 1);

	let no_transcript =
		service.memory_transcript(USER, registered.memory_id, TranscriptFormat::Text).await;

	assert!(matches!(no_transcript, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn audio_upload_is_transcribed_into_timed_chunks() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping audio_upload_is_transcribed_into_timed_chunks; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).with_distill(SNAPSHOT));
	let transcription = Arc::new(StubTranscription::words(SPOKEN));
	let service = scripted_service(&test_db, completion, transcription.clone()).await;
	let registered = service
		.register_upload(upload("voice-note.m4a", "audio/mp4"))
		.await
		.expect("Upload failed.");

	assert_eq!(registered.media_type, "audio");

	service.process_memory(registered.memory_id).await.expect("Processing failed.");

	let detail =
		service.get_memory(USER, registered.memory_id).await.expect("Failed to load memory.");
	let semantic = detail.semantic.expect("Semantic layer should exist.");

	assert!(detail.memory.transcript_key.is_some());
	assert_eq!(semantic.emotion_weight, Some(4));
	assert_eq!(transcription.calls.load(Ordering::SeqCst), 1);

	let chunks =
		service.memory_chunks(USER, registered.memory_id).await.expect("Failed to list chunks.");

	assert_eq!(chunks.len(), 4);
	assert!(chunks.iter().all(|chunk| chunk.start_seconds.is_some()));
	assert!(chunks.iter().all(|chunk| chunk.start_offset.is_none()));
	assert_eq!(chunks[0].content, "This weekend Mia and");
	assert_eq!(chunks[1].start_seconds, Some(2.0));

	let text = service.memory_text(USER, registered.memory_id).await.expect("Failed to read text.");
	let url =
		service.memory_media_url(USER, registered.memory_id).await.expect("Failed to sign URL.");

	assert_eq!(text, SPOKEN);
	assert!(url.contains("signature="));

	let mia = keepsake_storage::queries::get_entity(&service.db.pool, USER, "Mia")
		.await
		.expect("Failed to load entity.")
		.expect("People from metadata become entities.");

	assert_eq!(mia.observation_count, 1);

	let srt = service
		.memory_transcript(USER, registered.memory_id, TranscriptFormat::Srt)
		.await
		.expect("Failed to export transcript.");
	let vtt = service
		.memory_transcript(USER, registered.memory_id, TranscriptFormat::Vtt)
		.await
		.expect("Failed to export transcript.");

	assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:00,400\nThis\n"), "{srt}");
	assert!(vtt.starts_with("WEBVTT\n\n00:00:00.000 --> 00:00:00.400\nThis\n"), "{vtt}");

	let hits = service
		.search_transcript(USER, registered.memory_id, "olympic", false)
		.await
		.expect("Transcript search failed.");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].word.text, "Olympic");
	assert!((hits[0].timestamp_seconds - 4.5).abs() < f64::EPSILON);
	assert_eq!(hits[0].context, "I drove out to the Olympic Peninsula and camped by the");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn video_upload_resumes_from_extracted_audio() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping video_upload_resumes_from_extracted_audio; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).with_distill(SNAPSHOT));
	let transcription = Arc::new(StubTranscription::words(SPOKEN));
	let service = scripted_service(&test_db, completion, transcription).await;
	let registered =
		service.register_upload(upload("campfire.mp4", "video/mp4")).await.expect("Upload failed.");

	service.process_memory(registered.memory_id).await.expect("Processing failed.");

	let detail =
		service.get_memory(USER, registered.memory_id).await.expect("Failed to load memory.");

	assert_eq!(detail.memory.media_type, "video");
	assert_eq!(detail.memory.status, ProcessingStatus::Completed.as_str());
	assert!(detail.memory.audio_key.is_some());
	assert!(detail.memory.transcript_key.is_some());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn failed_processing_is_recorded_and_requeued() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping failed_processing_is_recorded_and_requeued; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).with_distill(SNAPSHOT));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let registered = service
		.register_upload(upload("voice-note.mp3", "audio/mpeg"))
		.await
		.expect("Upload failed.");
	let err = service
		.process_memory(registered.memory_id)
		.await
		.expect_err("Transcription failure must surface.");

	assert!(err.is_retryable());

	let failed =
		service.get_memory(USER, registered.memory_id).await.expect("Failed to load memory.");
	let message = failed.memory.error_message.expect("Failure should be recorded.");

	assert_eq!(failed.memory.status, ProcessingStatus::Failed.as_str());
	assert!(message.starts_with("Provider error: Transcription failed"), "{message}");
	assert!(!message.contains('\n'));
	assert!(failed.semantic.is_none());

	service.requeue_memory(USER, registered.memory_id).await.expect("Requeue failed.");

	let again = service.requeue_memory(USER, registered.memory_id).await;

	assert!(matches!(again, Err(Error::Conflict { .. })));

	let pending =
		service.get_memory(USER, registered.memory_id).await.expect("Failed to load memory.");

	assert_eq!(pending.memory.status, ProcessingStatus::Pending.as_str());
	assert!(pending.memory.error_message.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn direct_text_save_creates_completed_memory() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping direct_text_save_creates_completed_memory; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle).with_distill(SNAPSHOT));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let memory_id = service
		.save_from_upload(SaveFromUploadRequest {
			user_id: USER.to_string(),
			memory_id: None,
			text: "Mia and I camped by the Hoh river this weekend.".to_string(),
			words: Vec::new(),
			metadata: MemoryMetadata { title: Some("Hoh river".to_string()), ..Default::default() },
		})
		.await
		.expect("Save failed.");
	let detail = service.get_memory(USER, memory_id).await.expect("Failed to load memory.");

	assert_eq!(detail.memory.title, "Hoh river");
	assert_eq!(detail.memory.status, ProcessingStatus::Completed.as_str());
	assert_eq!(detail.semantic.map(|semantic| semantic.content), Some(SNAPSHOT.to_string()));

	let blank = service
		.save_from_upload(SaveFromUploadRequest {
			user_id: USER.to_string(),
			memory_id: None,
			text: "   ".to_string(),
			words: Vec::new(),
			metadata: MemoryMetadata::default(),
		})
		.await;

	assert!(matches!(blank, Err(Error::InvalidRequest { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
