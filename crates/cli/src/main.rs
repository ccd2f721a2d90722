use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    qbrgen_cli::run().await
}
