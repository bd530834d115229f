//! Produce a presigned URL without any network access.
//!
//! ```sh
//! cargo run --example presign_url
//! ```

use std::time::Duration;

use http::Method;
use reqexec_core::{
    Config, Context, Executor, OperationRequest, Result, SigningVersion, StaticCredentialProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // A default context has no transport at all: presigning never sends.
    let executor = Executor::new(
        Context::new(),
        Config::new(
            "oss-cn-hangzhou.aliyuncs.com",
            "my-bucket",
            "cn-hangzhou",
            SigningVersion::V4,
        ),
        StaticCredentialProvider::new("demo-access-key-id", "demo-access-key-secret"),
    )?;

    let req = OperationRequest::new("GetObject", Method::GET).with_key("photos/cat.jpg");
    let presigned = executor.presign(&req, Duration::from_secs(3600)).await?;

    println!("method:  {}", presigned.method);
    println!("url:     {}", presigned.url);
    println!("expires: {}", presigned.expires_at);
    println!("headers: {:?}", presigned.signed_headers);

    Ok(())
}
