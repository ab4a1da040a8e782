//! Concrete implementations of the store, transport and asset ports

pub mod fs;
#[cfg(feature = "http")]
pub mod http;
pub mod sqlite;

pub use fs::FsAssetStore;
#[cfg(feature = "http")]
pub use http::HttpRemoteApi;
pub use sqlite::{DbPool, SqliteStore};
