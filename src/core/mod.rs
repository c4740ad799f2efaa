pub mod error;
pub mod request;
pub mod preview;
pub mod store;
pub mod poller;
pub mod gallery;
pub mod connectivity;
pub mod coordinator;
#[cfg(test)]
pub(crate) mod testing;
