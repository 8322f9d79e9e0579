use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = passway::cli::Cli::parse();
    if let Err(e) = passway::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
