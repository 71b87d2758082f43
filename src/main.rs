#[tokio::main]
async fn main() {
    pollboard::start_server().await;
}
