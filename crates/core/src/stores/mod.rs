pub mod disk;
pub mod qdrant;

pub use disk::{DiskIndex, DiskStore};
pub use qdrant::{QdrantIndex, QdrantStore};
