use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    archmap_cli::main_entry().await
}
