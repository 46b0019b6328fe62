use std::time::Duration;

use color_eyre::Result;

use keepsake_config::Worker;
use keepsake_service::KeepsakeService;

const MIN_POLL_INTERVAL_MS: u64 = 50;

pub fn poll_interval(cfg: &Worker) -> Duration {
	Duration::from_millis(cfg.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
}

/// Polls for pending memories forever. The worker only sleeps once the queue is drained.
pub async fn run_worker(service: &KeepsakeService, poll_interval: Duration) -> Result<()> {
	tracing::info!(poll_interval_ms = poll_interval.as_millis() as u64, "Worker started.");

	loop {
		match drain_pending(service).await {
			Ok(0) => {},
			Ok(processed) => tracing::info!(processed, "Drained pending memories."),
			Err(err) => tracing::error!(error = %err, "Claiming pending memories failed."),
		}

		tokio::time::sleep(poll_interval).await;
	}
}

/// Claims and processes memories until none are pending. Processing failures are already
/// recorded on the row, so they are logged and the loop moves on.
pub async fn drain_pending(service: &KeepsakeService) -> keepsake_service::Result<usize> {
	let mut processed = 0;

	while let Some(memory) = service.claim_next_pending().await? {
		let memory_id = memory.memory_id;

		match service.process_memory(memory_id).await {
			Ok(()) => tracing::info!(memory_id = %memory_id, "Memory processed."),
			Err(err) => tracing::error!(
				memory_id = %memory_id,
				retryable = err.is_retryable(),
				error = %err,
				"Memory processing failed."
			),
		}

		processed += 1;
	}

	Ok(processed)
}
