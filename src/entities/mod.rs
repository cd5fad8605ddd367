//! SeaORM entities. Plain records with explicit foreign-key columns; related
//! rows are resolved by keyed lookups in the services.

pub mod bill_of_material;
pub mod inventory_balance;
pub mod order_tracking;
pub mod product;
pub mod product_assembly;
pub mod product_movement;
pub mod product_movement_summary;
pub mod product_request;
pub mod product_request_item;
pub mod purchase_item;
pub mod purchase_order;
pub mod sales_item;
pub mod sales_order;
pub mod status;
pub mod warehouse;

pub use product_movement::{Direction, MovementType};
pub use status::{AssemblyStatus, ProductRequestStatus, PurchaseOrderStatus, SalesOrderStatus};
