#[tokio::main]
async fn main() {
    if let Err(e) = verisight_relay::run().await {
        eprintln!("fatal: {}", e);
        std::process::exit(1);
    }
}
