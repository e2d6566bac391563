// crates/network/src/lib.rs
//! Network utilities for HTTP requests, connectivity and downloads

mod client;
mod connectivity;
mod download;
mod error;
mod retry;

pub use client::{Client, ClientConfig};
pub use connectivity::{ConnectivityChecker, ConnectivityFlag, NetworkMonitor};
pub use download::DownloadManager;
pub use error::{NetworkError, NetworkResult};
pub use reqwest::Method;
pub use retry::RetryPolicy;
