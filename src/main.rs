#[tokio::main]
async fn main() {
    spellgate::start_server().await;
}
