pub mod config;
pub mod core;
pub mod handlers;
pub mod utils;
pub mod knowledge_graph;

pub use config::Configuration;
pub use core::{ConversionError, ConversionRequest, RdfConverter};
pub use handlers::{read_headers, DelimitedFile};
pub use knowledge_graph::KnowledgeGraph;
