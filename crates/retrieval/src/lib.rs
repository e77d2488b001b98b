//! Retrieval for ragent: vector stores and the query-to-context client.
//!
//! Backends:
//! - **postgres**: PostgreSQL + pgvector over a lazy `sqlx` pool
//! - **in_memory**: brute-force cosine search (tests, no-database runs)

pub mod in_memory;
pub mod postgres;
pub mod retriever;
pub mod vector;

pub use in_memory::InMemoryStore;
pub use postgres::PgVectorStore;
pub use retriever::Retriever;
pub use vector::{cosine_distance, to_vector_literal};
