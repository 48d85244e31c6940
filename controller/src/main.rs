mod host;
mod probes;
mod storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
