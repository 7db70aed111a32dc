pub mod gateway;
pub mod reconcile;
pub mod rows;

pub use gateway::{GatewayError, GatewayResult, ObjectGateway, ObjectStoreGateway, StoreBackend, StoreConfig};
pub use reconcile::ReconciliationEngine;
pub use rows::{RowResult, RowStore, RowStoreError};
