use clap::Parser;

use somnosync::cli::{self, Cli};

/// Entry point. All real work lives in the library; this only parses
/// arguments and forwards the exit code.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let code = cli::run(cli).await;
    std::process::exit(code);
}
