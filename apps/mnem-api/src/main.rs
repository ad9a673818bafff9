use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = mnem_api::Args::parse();

	mnem_api::run(args).await
}
