pub mod assemblies;
pub mod catalog;
pub mod common;
pub mod inventory;
pub mod product_requests;
pub mod purchase_orders;
pub mod reports;
pub mod sales_orders;

use crate::{
    auth::Policy,
    config::SalesStockTrigger,
    events::EventSender,
    services::{
        assemblies::AssemblyService, catalog::CatalogService, inventory::InventoryService,
        ledger::LedgerService, product_requests::ProductRequestService,
        purchase_orders::PurchaseOrderService, reports::ReportService,
        sales_orders::SalesOrderService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Container for all services shared by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub inventory: Arc<InventoryService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub sales_orders: Arc<SalesOrderService>,
    pub assemblies: Arc<AssemblyService>,
    pub product_requests: Arc<ProductRequestService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    /// Wires every service against one pool, policy and event channel
    pub fn new(
        db: Arc<DatabaseConnection>,
        policy: Arc<dyn Policy>,
        event_sender: Option<EventSender>,
        stock_trigger: SalesStockTrigger,
    ) -> Self {
        let ledger = LedgerService::new(db.clone(), event_sender.clone());

        Self {
            catalog: Arc::new(CatalogService::new(db.clone(), policy.clone())),
            inventory: Arc::new(InventoryService::new(db.clone(), ledger, policy.clone())),
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db.clone(),
                policy.clone(),
                event_sender.clone(),
            )),
            sales_orders: Arc::new(SalesOrderService::new(
                db.clone(),
                policy.clone(),
                event_sender.clone(),
                stock_trigger,
            )),
            assemblies: Arc::new(AssemblyService::new(
                db.clone(),
                policy.clone(),
                event_sender.clone(),
            )),
            product_requests: Arc::new(ProductRequestService::new(
                db.clone(),
                policy.clone(),
                event_sender.clone(),
            )),
            reports: Arc::new(ReportService::new(db, policy, event_sender)),
        }
    }
}
