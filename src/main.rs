use miette::Result;
use reghosts::Reghosts;

#[async_std::main]
async fn main() -> Result<()> {
    Reghosts::load().await
}
