use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    docchat_cli::run().await
}
