pub mod worker;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre;
use tracing_subscriber::EnvFilter;

use keepsake_service::KeepsakeService;
use keepsake_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = keepsake_cli::VERSION,
	rename_all = "kebab",
	styles = keepsake_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = keepsake_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let tokenizer = match config.chunking.tokenizer_repo.as_deref() {
		Some(repo) => {
			Some(keepsake_chunking::load_tokenizer(repo).map_err(|err| eyre::eyre!(err))?)
		},
		None => None,
	};
	let poll_interval = worker::poll_interval(&config.worker);
	let mut service = KeepsakeService::new(config, db);

	if let Some(tokenizer) = tokenizer {
		service = service.with_tokenizer(tokenizer);
	}

	worker::run_worker(&service, poll_interval).await
}
