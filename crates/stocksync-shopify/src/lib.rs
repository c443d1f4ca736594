pub mod client;
pub mod error;
pub mod pagination;
pub mod types;

pub use client::{SetQuantityResult, ShopifyClient};
pub use error::ShopifyError;
pub use pagination::extract_next_cursor;
pub use types::{
    legacy_id, Collection, InventoryLevel, InventoryLevelNode, Location, NewOption, NewProduct,
    NewVariant, Product, SaleProduct, SaleVariant, SkuVariant, StockedProduct, Variant,
    VariantUpdate,
};
