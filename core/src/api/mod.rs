mod client;
mod error;
mod transport;
mod types;

pub use client::{FaucetApi, RetryPolicy};
pub use error::ApiError;
pub use transport::{HttpMethod, HttpTransport, RawResponse, ReqwestTransport};
pub use types::{Balance, CashoutOutcome, WagerResult};
