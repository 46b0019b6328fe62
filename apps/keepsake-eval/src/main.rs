use clap::Parser;

use keepsake_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	keepsake_eval::run(args).await
}
