//! Feature extractors for the two candidate pools.

pub mod audio;
pub mod embeddings;
pub mod thumbnail;

pub use embeddings::{EmbeddingTable, EmbeddingTableError};
pub use thumbnail::{THUMBNAIL_DIMS, THUMBNAIL_SIDE, ThumbnailExtractor};
