use clap::Parser;

use cloudpull::cli::{run, Cli};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}
