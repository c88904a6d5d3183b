pub mod in_memory;
pub mod ndjson_source;

pub use in_memory::InMemoryPlaceStore;
pub use ndjson_source::NdjsonRowSource;
