#[tokio::main]
async fn main() {
    if let Err(e) = ai_cooking_lib::run().await {
        eprintln!("ai-cooking: {}", e);
        std::process::exit(1);
    }
}
