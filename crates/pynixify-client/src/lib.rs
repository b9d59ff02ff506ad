pub use cache::{DirectoryCache, MemoryCache, PypiCache};
pub use error::Error;
pub use registry_client::PypiClient;

mod cache;
mod error;
mod registry_client;
