use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{Action, Actor, Policy},
    entities::{
        product::{self, Entity as ProductEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
    money::round_money,
};

use super::Page;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub unit_of_measure: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWarehouseRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub is_virtual: bool,
}

/// Products and warehouses: the reference data every movement points at.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    policy: Arc<dyn Policy>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, policy: Arc<dyn Policy>) -> Self {
        Self { db, policy }
    }

    #[instrument(skip(self, actor, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        actor: &Actor,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        self.policy.authorize(actor, Action::ProductsWrite)?;
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }

        let sku = request.sku.trim().to_ascii_uppercase();
        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(sku.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "product with SKU {} already exists",
                sku
            )));
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku),
            name: Set(request.name.trim().to_string()),
            unit_of_measure: Set(request.unit_of_measure.trim().to_string()),
            price: Set(round_money(request.price)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_product(&self, actor: &Actor, id: Uuid) -> Result<product::Model, ServiceError> {
        self.policy.authorize(actor, Action::ProductsRead)?;
        ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))
    }

    #[instrument(skip(self, actor))]
    pub async fn list_products(
        &self,
        actor: &Actor,
        page: u64,
        per_page: u64,
    ) -> Result<Page<product::Model>, ServiceError> {
        self.policy.authorize(actor, Action::ProductsRead)?;
        let paginator = ProductEntity::find()
            .order_by_asc(product::Column::Sku)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok(Page {
            items,
            total,
            page: page.max(1),
            per_page,
        })
    }

    #[instrument(skip(self, actor, request), fields(code = %request.code))]
    pub async fn create_warehouse(
        &self,
        actor: &Actor,
        request: CreateWarehouseRequest,
    ) -> Result<warehouse::Model, ServiceError> {
        self.policy.authorize(actor, Action::WarehousesWrite)?;
        request.validate()?;

        let code = request.code.trim().to_ascii_uppercase();
        let existing = WarehouseEntity::find()
            .filter(warehouse::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "warehouse {} already exists",
                code
            )));
        }

        let now = Utc::now();
        let warehouse = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(request.name.trim().to_string()),
            is_virtual: Set(request.is_virtual),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(warehouse_id = %warehouse.id, "warehouse created");
        Ok(warehouse)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_warehouse(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<warehouse::Model, ServiceError> {
        self.policy.authorize(actor, Action::WarehousesRead)?;
        WarehouseEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("warehouse {}", id)))
    }

    #[instrument(skip(self, actor))]
    pub async fn list_warehouses(&self, actor: &Actor) -> Result<Vec<warehouse::Model>, ServiceError> {
        self.policy.authorize(actor, Action::WarehousesRead)?;
        Ok(WarehouseEntity::find()
            .order_by_asc(warehouse::Column::Code)
            .all(&*self.db)
            .await?)
    }
}
