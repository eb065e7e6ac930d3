use anyhow::Result;

use carelink::app::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
