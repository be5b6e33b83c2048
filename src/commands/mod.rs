use async_trait::async_trait;
use miette::Result;

pub mod ping;
pub mod resolve;

#[async_trait]
pub trait ReghostsCommand {
    async fn execute(self) -> Result<()>;
}
