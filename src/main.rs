use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = medscan_lib::Cli::parse();

    if let Err(e) = medscan_lib::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
