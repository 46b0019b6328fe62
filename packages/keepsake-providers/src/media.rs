use std::{path::Path, process::Stdio, time::Duration};

use color_eyre::{Result, eyre};
use tokio::{fs, process::Command, time};
use uuid::Uuid;

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

/// Extracts the audio track of a video as MP3 using the `ffmpeg` binary on `PATH`.
pub async fn extract_audio(video: &[u8]) -> Result<Vec<u8>> {
	let workdir = std::env::temp_dir().join(format!("keepsake-ffmpeg-{}", Uuid::new_v4()));

	fs::create_dir_all(&workdir).await?;

	let result = run_ffmpeg(&workdir, video).await;

	if let Err(err) = fs::remove_dir_all(&workdir).await {
		tracing::warn!(error = %err, path = %workdir.display(), "Failed to remove ffmpeg workdir.");
	}

	result
}

async fn run_ffmpeg(workdir: &Path, video: &[u8]) -> Result<Vec<u8>> {
	let input = workdir.join("input");
	let output = workdir.join("audio.mp3");

	fs::write(&input, video).await?;

	let child = Command::new("ffmpeg")
		.arg("-y")
		.arg("-i")
		.arg(&input)
		.args(["-vn", "-acodec", "libmp3lame", "-q:a", "2"])
		.arg(&output)
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.kill_on_drop(true)
		.spawn()?;
	let out = time::timeout(EXTRACT_TIMEOUT, child.wait_with_output())
		.await
		.map_err(|_| {
			eyre::eyre!("ffmpeg did not finish within {}s.", EXTRACT_TIMEOUT.as_secs())
		})??;

	if !out.status.success() {
		let stderr = String::from_utf8_lossy(&out.stderr);
		let lines: Vec<&str> = stderr.lines().collect();
		let tail = lines[lines.len().saturating_sub(5)..].join(" | ");

		return Err(eyre::eyre!("ffmpeg exited with {}: {tail}", out.status));
	}

	Ok(fs::read(&output).await?)
}
