pub mod serialization;

pub use serialization::RdfSerializer;
