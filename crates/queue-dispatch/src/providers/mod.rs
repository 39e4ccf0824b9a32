//! Provider implementations of the primitive queue API.

pub mod aws;
pub mod memory;

pub use aws::SqsApi;
pub use memory::InMemoryApi;
