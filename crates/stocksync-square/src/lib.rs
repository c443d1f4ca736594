pub mod client;
pub mod error;
pub mod types;

pub use client::{SquareClient, COUNTS_CHUNK_SIZE, SQUARE_VERSION};
pub use error::SquareError;
pub use types::{
    CatalogObject, CatalogVariation, InventoryCount, ItemData, Money, SquareLocation,
    VariationData,
};
