#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dtm_cli::main_entry().await
}
