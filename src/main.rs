#[tokio::main]
async fn main() -> anyhow::Result<()> {
    embu_api::app::run().await
}
