use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests for the downloader. Implemented by
/// [`BasicClient`](super::BasicClient); tests can substitute their own.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
