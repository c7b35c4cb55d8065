pub mod schema;
pub mod path;
pub mod descriptors;
pub mod flatten;

pub use schema::{Descriptor, FlattenedRow, Scalar};
pub use path::PathKey;
pub use descriptors::{DescriptorExtractor, ExtractOptions};
pub use flatten::{column_count, flatten};
