use clap::Parser;

use keepsake_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	keepsake_worker::run(args).await
}
