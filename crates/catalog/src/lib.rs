pub mod demo;
pub mod fixture;
pub mod memory;

pub use demo::{demo_catalog, DEMO_CATALOG_TOML};
pub use fixture::{load_catalog, parse_catalog, Catalog, CatalogError, CatalogFormat};
pub use memory::{InMemoryContentLookup, InMemorySegmentSource, InMemoryTargetingGroupLookup};
