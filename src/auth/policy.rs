/*!
 * # Permission Policy
 *
 * Central capability check consulted once per service operation, before any
 * transaction is opened. Roles map to permission strings of the form
 * `resource:action`; `resource:*` and `*` act as wildcards.
 */

use super::Actor;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

/// Every guarded operation of the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ProductsRead,
    ProductsWrite,
    WarehousesRead,
    WarehousesWrite,
    InventoryRead,
    InventoryAdjust,
    InventoryConfigure,
    PurchaseOrdersRead,
    PurchaseOrdersCreate,
    PurchaseOrdersApprove,
    PurchaseOrdersReceive,
    PurchaseOrdersCancel,
    SalesOrdersRead,
    SalesOrdersCreate,
    SalesOrdersConfirm,
    SalesOrdersShip,
    SalesOrdersDeliver,
    SalesOrdersCancel,
    AssembliesRead,
    AssembliesCreate,
    AssembliesStart,
    AssembliesComplete,
    AssembliesCancel,
    ProductRequestsRead,
    ProductRequestsCreate,
    ProductRequestsApprove,
    ProductRequestsReject,
    ProductRequestsComplete,
    ReportsRead,
    ReportsRegenerate,
}

impl Action {
    /// Permission string required for this action.
    pub fn permission(&self) -> &'static str {
        match self {
            Action::ProductsRead => "products:read",
            Action::ProductsWrite => "products:write",
            Action::WarehousesRead => "warehouses:read",
            Action::WarehousesWrite => "warehouses:write",
            Action::InventoryRead => "inventory:read",
            Action::InventoryAdjust => "inventory:adjust",
            Action::InventoryConfigure => "inventory:configure",
            Action::PurchaseOrdersRead => "purchase_orders:read",
            Action::PurchaseOrdersCreate => "purchase_orders:create",
            Action::PurchaseOrdersApprove => "purchase_orders:approve",
            Action::PurchaseOrdersReceive => "purchase_orders:receive",
            Action::PurchaseOrdersCancel => "purchase_orders:cancel",
            Action::SalesOrdersRead => "sales_orders:read",
            Action::SalesOrdersCreate => "sales_orders:create",
            Action::SalesOrdersConfirm => "sales_orders:confirm",
            Action::SalesOrdersShip => "sales_orders:ship",
            Action::SalesOrdersDeliver => "sales_orders:deliver",
            Action::SalesOrdersCancel => "sales_orders:cancel",
            Action::AssembliesRead => "assemblies:read",
            Action::AssembliesCreate => "assemblies:create",
            Action::AssembliesStart => "assemblies:start",
            Action::AssembliesComplete => "assemblies:complete",
            Action::AssembliesCancel => "assemblies:cancel",
            Action::ProductRequestsRead => "product_requests:read",
            Action::ProductRequestsCreate => "product_requests:create",
            Action::ProductRequestsApprove => "product_requests:approve",
            Action::ProductRequestsReject => "product_requests:reject",
            Action::ProductRequestsComplete => "product_requests:complete",
            Action::ReportsRead => "reports:read",
            Action::ReportsRegenerate => "reports:regenerate",
        }
    }
}

/// Known roles. Unknown role strings on an actor grant nothing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Purchasing,
    Sales,
    Warehouse,
    Cashier,
    Viewer,
}

const READ_ONLY: &[&str] = &[
    "products:read",
    "warehouses:read",
    "inventory:read",
    "purchase_orders:read",
    "sales_orders:read",
    "assemblies:read",
    "product_requests:read",
    "reports:read",
];

impl Role {
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Role::Admin => &["*"],
            Role::Manager => &[
                "products:*",
                "warehouses:*",
                "inventory:*",
                "purchase_orders:*",
                "sales_orders:*",
                "assemblies:*",
                "product_requests:*",
                "reports:*",
            ],
            Role::Purchasing => &[
                "products:read",
                "warehouses:read",
                "inventory:read",
                "purchase_orders:read",
                "purchase_orders:create",
                "purchase_orders:cancel",
            ],
            Role::Sales => &[
                "products:read",
                "warehouses:read",
                "inventory:read",
                "sales_orders:read",
                "sales_orders:create",
                "sales_orders:confirm",
                "sales_orders:cancel",
            ],
            Role::Warehouse => &[
                "products:read",
                "warehouses:read",
                "inventory:read",
                "inventory:adjust",
                "purchase_orders:read",
                "purchase_orders:receive",
                "sales_orders:read",
                "sales_orders:ship",
                "sales_orders:deliver",
                "assemblies:*",
                "product_requests:read",
                "product_requests:create",
                "product_requests:complete",
            ],
            Role::Cashier => &[
                "products:read",
                "inventory:read",
                "sales_orders:read",
                "sales_orders:create",
                "sales_orders:confirm",
                "sales_orders:deliver",
            ],
            Role::Viewer => READ_ONLY,
        }
    }
}

/// Matches a granted permission against a required one.
pub fn check_permission(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    match granted.strip_suffix(":*") {
        Some(resource) => required
            .split_once(':')
            .map(|(required_resource, _)| required_resource == resource)
            .unwrap_or(false),
        None => false,
    }
}

/// Authorization collaborator consulted by every service operation.
pub trait Policy: Send + Sync {
    fn authorize(&self, actor: &Actor, action: Action) -> Result<(), ServiceError>;
}

/// Static role-to-permission table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl RolePolicy {
    pub fn allows(&self, actor: &Actor, action: Action) -> bool {
        let required = action.permission();
        actor
            .roles
            .iter()
            .filter_map(|r| Role::from_str(r).ok())
            .flat_map(|role| role.permissions().iter())
            .any(|granted| check_permission(granted, required))
    }
}

impl Policy for RolePolicy {
    fn authorize(&self, actor: &Actor, action: Action) -> Result<(), ServiceError> {
        if self.allows(actor, action) {
            Ok(())
        } else {
            warn!(
                user_id = %actor.user_id,
                permission = action.permission(),
                "permission denied"
            );
            metrics::counter!("stockflow_authorization_denied_total", 1);
            Err(ServiceError::Forbidden(format!(
                "missing permission {}",
                action.permission()
            )))
        }
    }
}
