pub mod error;
pub mod naming;
pub mod dedup;
pub mod compiler;
pub mod converter;

pub use error::{ConversionError, ConversionResult, ErrorKind};
pub use naming::{camel_case, IdSource, IriMinter, SequentialIds, UuidSource};
pub use dedup::DistinctValueCache;
pub use compiler::{ColumnRole, ColumnSelection, ConversionContext, RowCompiler};
pub use converter::{CancellationFlag, ConversionOutput, ConversionReport, ConversionRequest, RdfConverter};
