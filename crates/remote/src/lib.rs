//! Remote Store access
//!
//! The cloud side of the hymnal: the canonical hymn catalog plus per-user
//! preference, favorites and recent documents. [`RemoteStore`] is the
//! contract the sync engine talks to; [`HttpRemoteStore`] speaks to the REST
//! backend and [`MemoryRemoteStore`] keeps everything in process.

mod error;
mod http;
mod memory;
mod traits;

pub use error::{RemoteError, RemoteResult};
pub use http::HttpRemoteStore;
pub use memory::{MemoryRemoteStore, RemoteOperation};
pub use traits::{merge_documents, RemoteStore, UserCollection};
