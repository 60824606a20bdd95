//! Named similarity indexes over chunks: one per source document plus one
//! combined partition over every chunk.

pub mod index;
pub mod registry;
pub mod selector;

pub use index::{IndexEntry, PartitionIndex};
pub use registry::{PartitionLoader, PartitionRegistry, ReloadPolicy};
pub use selector::{PartitionSelector, SelectionError};
