#[tokio::main]
async fn main() {
    let code = runebattle_e2e::cli::run().await;
    std::process::exit(code);
}
