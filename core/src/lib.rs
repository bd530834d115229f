//! Signing and executing object storage requests without effort.
//!
//! reqexec-core is the engine underneath an object storage client: it turns
//! one abstract [`OperationRequest`] into a signed, retried, and
//! integrity-checked exchange with the service, or into a [`PresignedRequest`]
//! computed entirely offline.
//!
//! The pieces compose around a small set of types:
//!
//! - [`Context`]: injected collaborators (HTTP transport, environment).
//! - [`ProvideCredential`]: async credential sources, cached by the executor.
//! - [`CanonicalRequest`] and [`RequestSigner`]: deterministic serialization
//!   and the two signature algorithms placed on it.
//! - [`RetryPolicy`] and [`ClockOffset`]: attempt classification, backoff,
//!   and clock-skew correction.
//! - [`Executor`]: the attempt loop tying all of the above together.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use reqexec_core::{
//!     Config, Context, Executor, OperationRequest, SigningVersion, StaticCredentialProvider,
//! };
//!
//! # async fn run() -> reqexec_core::Result<()> {
//! let ctx = Context::new(); // plug in a real transport for execution
//! let config = Config::new(
//!     "oss-cn-hangzhou.aliyuncs.com",
//!     "my-bucket",
//!     "cn-hangzhou",
//!     SigningVersion::V4,
//! );
//! let executor = Executor::new(
//!     ctx,
//!     config,
//!     StaticCredentialProvider::new("access_key_id", "access_key_secret"),
//! )?;
//!
//! let req = OperationRequest::new("GetObject", http::Method::GET).with_key("hello.txt");
//! let presigned = executor.presign(&req, Duration::from_secs(3600)).await?;
//! println!("{}", presigned.url);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod canonical;
mod clock;
mod config;
mod constants;
mod context;
mod credential;
mod error;
mod executor;
mod hash;
mod integrity;
mod request;
mod response;
mod retry;
mod sign;
mod time;

pub use canonical::CanonicalRequest;
pub use clock::{detect_skew, ClockOffset};
pub use config::Config;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};
pub use credential::{
    Credential, CredentialCache, EnvCredentialProvider, ProvideCredential,
    StaticCredentialProvider,
};
pub use error::{Error, ErrorKind, Result, ServiceError};
pub use executor::Executor;
pub use integrity::{Crc64, IntegrityStream};
pub use request::{OperationRequest, ProgressFn, RequestBody};
pub use response::{OperationResponse, PresignedRequest};
pub use retry::{Classification, RetryPolicy};
pub use sign::{RequestSigner, SigningContext, SigningVersion};
pub use time::{format_date, format_http_date, format_iso8601, now, parse_http_date, DateTime};
