use std::sync::Arc;

use keepsake_service::{CreateTextMemoryRequest, Error, MemoryMetadata};

use super::{ScriptedCompletion, StubTranscription, USER, echo_seattle, scripted_service, test_db};

#[tokio::test]
#[ignore = "Requires external Postgres. Set KEEPSAKE_PG_DSN to run."]
async fn merging_tags_moves_every_link_to_the_target() {
	let Some(test_db) = test_db().await else {
		eprintln!(
			"Skipping merging_tags_moves_every_link_to_the_target; set KEEPSAKE_PG_DSN to run this test."
		);

		return;
	};
	let completion = Arc::new(ScriptedCompletion::new(echo_seattle));
	let transcription = Arc::new(StubTranscription::failing());
	let service = scripted_service(&test_db, completion, transcription).await;
	let hiking = service.create_tag(USER, "hiking", None).await.expect("Failed to create tag.");
	let hikes = service.create_tag(USER, "Hikes", None).await.expect("Failed to create tag.");
	let outdoors =
		service.create_tag(USER, "outdoors", Some("#2E7D32")).await.expect("Failed to create tag.");

	assert_eq!(outdoors.color.as_deref(), Some("#2e7d32"));

	for (text, tag_ids) in [
		("Climbed Mount Si before sunrise.", vec![hiking.tag_id]),
		("Camped at Lake Ingalls.", vec![hikes.tag_id, outdoors.tag_id]),
	] {
		service
			.create_text_memory(CreateTextMemoryRequest {
				user_id: USER.to_string(),
				text: text.to_string(),
				metadata: MemoryMetadata { tag_ids, ..Default::default() },
			})
			.await
			.expect("Failed to create memory.");
	}

	let duplicate_name = service.update_tag(USER, hikes.tag_id, Some("HIKING"), None).await;

	assert!(matches!(duplicate_name, Err(Error::Conflict { .. })));

	let self_merge = service.merge_tags(USER, &[outdoors.tag_id], outdoors.tag_id).await;

	assert!(matches!(self_merge, Err(Error::InvalidRequest { .. })));

	let merged = service
		.merge_tags(USER, &[hiking.tag_id, hikes.tag_id, hikes.tag_id], outdoors.tag_id)
		.await
		.expect("Merge failed.");

	assert_eq!(merged.target.tag_id, outdoors.tag_id);
	assert_eq!(merged.merged, 2);
	assert_eq!(merged.relinked, 1);

	let tags = service.list_tags(USER).await.expect("Failed to list tags.");

	assert_eq!(tags.len(), 1);
	assert_eq!(tags[0].name, "outdoors");
	assert_eq!(tags[0].memory_count, 2);

	let missing = service.delete_tag(USER, hiking.tag_id).await;

	assert!(matches!(missing, Err(Error::NotFound { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
