//! docqa-vector
//!
//! Dense retrieval over chunk embeddings. [`FlatIndex`] keeps vectors in
//! memory and scores them exactly; with the `lance` feature, [`LanceStore`]
//! persists them in a LanceDB table. Both reuse embeddings of unchanged chunk
//! texts across rebuilds through an [`EmbeddingCache`].

pub mod cache;
pub mod embed;
pub mod flat;
#[cfg(feature = "lance")]
pub mod lance;

pub use cache::{hash_content, EmbeddingCache};
pub use flat::FlatIndex;
#[cfg(feature = "lance")]
pub use lance::LanceStore;
