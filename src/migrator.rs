use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_inventory_tables::Migration),
            Box::new(m20240301_000003_create_purchasing_tables::Migration),
            Box::new(m20240301_000004_create_sales_tables::Migration),
            Box::new(m20240301_000005_create_assembly_tables::Migration),
            Box::new(m20240301_000006_create_product_request_tables::Migration),
        ]
    }
}

/// Quantity and money columns share the `Decimal(16, 4)` storage precision; SQLite accepts at most 16 digits.
fn quantity_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).decimal_len(16, 4).not_null().to_owned()
}

fn timestamp_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn optional_timestamp_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).timestamp_with_time_zone().null().to_owned()
}

fn version_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).integer().not_null().default(1).to_owned()
}

mod m20240301_000001_create_catalog_tables {
    use super::timestamp_col;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null().unique_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::UnitOfMeasure).string().not_null())
                        .col(super::quantity_col(Products::Price))
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(timestamp_col(Products::CreatedAt))
                        .col(timestamp_col(Products::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::IsVirtual)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(timestamp_col(Warehouses::CreatedAt))
                        .col(timestamp_col(Warehouses::UpdatedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        UnitOfMeasure,
        Price,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        IsVirtual,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_inventory_tables {
    use super::{quantity_col, timestamp_col, version_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBalances::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBalances::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBalances::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(quantity_col(InventoryBalances::Quantity))
                        .col(
                            ColumnDef::new(InventoryBalances::MinimumStockLevel)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::MaximumStockLevel)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .col(version_col(InventoryBalances::Version))
                        .col(timestamp_col(InventoryBalances::CreatedAt))
                        .col(timestamp_col(InventoryBalances::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_balances_product_warehouse")
                        .table(InventoryBalances::Table)
                        .col(InventoryBalances::ProductId)
                        .col(InventoryBalances::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductMovements::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductMovements::Direction).string().not_null())
                        .col(quantity_col(ProductMovements::Quantity))
                        .col(ColumnDef::new(ProductMovements::ReferenceType).string().null())
                        .col(ColumnDef::new(ProductMovements::ReferenceId).uuid().null())
                        .col(timestamp_col(ProductMovements::MovementDate))
                        .col(ColumnDef::new(ProductMovements::CreatedBy).uuid().null())
                        .col(ColumnDef::new(ProductMovements::Notes).string().null())
                        .col(timestamp_col(ProductMovements::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_movements_product_warehouse")
                        .table(ProductMovements::Table)
                        .col(ProductMovements::ProductId)
                        .col(ProductMovements::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_movements_reference")
                        .table(ProductMovements::Table)
                        .col(ProductMovements::ReferenceId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductMovementSummaries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductMovementSummaries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMovementSummaries::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMovementSummaries::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductMovementSummaries::SummaryDate)
                                .date()
                                .not_null(),
                        )
                        .col(quantity_col(ProductMovementSummaries::OpeningBalance))
                        .col(quantity_col(ProductMovementSummaries::TotalIn))
                        .col(quantity_col(ProductMovementSummaries::TotalOut))
                        .col(quantity_col(ProductMovementSummaries::ClosingBalance))
                        .col(count_col(ProductMovementSummaries::PurchaseCount))
                        .col(count_col(ProductMovementSummaries::SaleCount))
                        .col(count_col(ProductMovementSummaries::AssemblyCount))
                        .col(count_col(ProductMovementSummaries::TransferCount))
                        .col(count_col(ProductMovementSummaries::AdjustmentCount))
                        .col(timestamp_col(ProductMovementSummaries::GeneratedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movement_summaries_key_date")
                        .table(ProductMovementSummaries::Table)
                        .col(ProductMovementSummaries::ProductId)
                        .col(ProductMovementSummaries::WarehouseId)
                        .col(ProductMovementSummaries::SummaryDate)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductMovementSummaries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryBalances::Table).to_owned())
                .await
        }
    }

    fn count_col<T: IntoIden>(col: T) -> ColumnDef {
        ColumnDef::new(col).integer().not_null().default(0).to_owned()
    }

    #[derive(DeriveIden)]
    enum InventoryBalances {
        Table,
        Id,
        ProductId,
        WarehouseId,
        Quantity,
        MinimumStockLevel,
        MaximumStockLevel,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductMovements {
        Table,
        Id,
        ProductId,
        WarehouseId,
        MovementType,
        Direction,
        Quantity,
        ReferenceType,
        ReferenceId,
        MovementDate,
        CreatedBy,
        Notes,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductMovementSummaries {
        Table,
        Id,
        ProductId,
        WarehouseId,
        SummaryDate,
        OpeningBalance,
        TotalIn,
        TotalOut,
        ClosingBalance,
        PurchaseCount,
        SaleCount,
        AssemblyCount,
        TransferCount,
        AdjustmentCount,
        GeneratedAt,
    }
}

mod m20240301_000003_create_purchasing_tables {
    use super::{optional_timestamp_col, quantity_col, timestamp_col, version_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_purchasing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierName).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(quantity_col(PurchaseOrders::TotalAmount))
                        .col(ColumnDef::new(PurchaseOrders::Notes).string().null())
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::ApprovedBy).uuid().null())
                        .col(optional_timestamp_col(PurchaseOrders::ApprovedAt))
                        .col(ColumnDef::new(PurchaseOrders::ReceivedBy).uuid().null())
                        .col(optional_timestamp_col(PurchaseOrders::ReceivedAt))
                        .col(ColumnDef::new(PurchaseOrders::CancelledBy).uuid().null())
                        .col(optional_timestamp_col(PurchaseOrders::CancelledAt))
                        .col(version_col(PurchaseOrders::Version))
                        .col(timestamp_col(PurchaseOrders::CreatedAt))
                        .col(timestamp_col(PurchaseOrders::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseItems::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseItems::WarehouseId).uuid().not_null())
                        .col(quantity_col(PurchaseItems::Quantity))
                        .col(quantity_col(PurchaseItems::UnitPrice))
                        .col(quantity_col(PurchaseItems::LineTotal))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_items_order")
                        .table(PurchaseItems::Table)
                        .col(PurchaseItems::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        OrderNumber,
        SupplierName,
        Status,
        TotalAmount,
        Notes,
        CreatedBy,
        ApprovedBy,
        ApprovedAt,
        ReceivedBy,
        ReceivedAt,
        CancelledBy,
        CancelledAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseItems {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        WarehouseId,
        Quantity,
        UnitPrice,
        LineTotal,
    }
}

mod m20240301_000004_create_sales_tables {
    use super::{optional_timestamp_col, quantity_col, timestamp_col, version_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SalesOrders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SalesOrders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(SalesOrders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SalesOrders::CustomerName).string().not_null())
                        .col(ColumnDef::new(SalesOrders::Status).string().not_null())
                        .col(quantity_col(SalesOrders::TotalAmount))
                        .col(ColumnDef::new(SalesOrders::Notes).string().null())
                        .col(ColumnDef::new(SalesOrders::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(SalesOrders::ConfirmedBy).uuid().null())
                        .col(optional_timestamp_col(SalesOrders::ConfirmedAt))
                        .col(optional_timestamp_col(SalesOrders::ShippedAt))
                        .col(optional_timestamp_col(SalesOrders::DeliveredAt))
                        .col(ColumnDef::new(SalesOrders::CancelledBy).uuid().null())
                        .col(optional_timestamp_col(SalesOrders::CancelledAt))
                        .col(
                            ColumnDef::new(SalesOrders::StockApplied)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(version_col(SalesOrders::Version))
                        .col(timestamp_col(SalesOrders::CreatedAt))
                        .col(timestamp_col(SalesOrders::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_orders_status")
                        .table(SalesOrders::Table)
                        .col(SalesOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SalesItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SalesItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SalesItems::SalesOrderId).uuid().not_null())
                        .col(ColumnDef::new(SalesItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SalesItems::WarehouseId).uuid().not_null())
                        .col(quantity_col(SalesItems::Quantity))
                        .col(quantity_col(SalesItems::UnitPrice))
                        .col(quantity_col(SalesItems::LineTotal))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_items_order")
                        .table(SalesItems::Table)
                        .col(SalesItems::SalesOrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderTrackings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderTrackings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderTrackings::SalesOrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderTrackings::FromStatus).string().null())
                        .col(ColumnDef::new(OrderTrackings::Status).string().not_null())
                        .col(ColumnDef::new(OrderTrackings::ActorId).uuid().not_null())
                        .col(ColumnDef::new(OrderTrackings::Notes).string().null())
                        .col(ColumnDef::new(OrderTrackings::Sequence).integer().not_null())
                        .col(timestamp_col(OrderTrackings::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_trackings_order_sequence")
                        .table(OrderTrackings::Table)
                        .col(OrderTrackings::SalesOrderId)
                        .col(OrderTrackings::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderTrackings::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SalesOrders {
        Table,
        Id,
        OrderNumber,
        CustomerName,
        Status,
        TotalAmount,
        Notes,
        CreatedBy,
        ConfirmedBy,
        ConfirmedAt,
        ShippedAt,
        DeliveredAt,
        CancelledBy,
        CancelledAt,
        StockApplied,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SalesItems {
        Table,
        Id,
        SalesOrderId,
        ProductId,
        WarehouseId,
        Quantity,
        UnitPrice,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum OrderTrackings {
        Table,
        Id,
        SalesOrderId,
        FromStatus,
        Status,
        ActorId,
        Notes,
        Sequence,
        CreatedAt,
    }
}

mod m20240301_000005_create_assembly_tables {
    use super::{optional_timestamp_col, quantity_col, timestamp_col, version_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_assembly_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductAssemblies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductAssemblies::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductAssemblies::AssemblyNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductAssemblies::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductAssemblies::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(quantity_col(ProductAssemblies::Quantity))
                        .col(ColumnDef::new(ProductAssemblies::Status).string().not_null())
                        .col(ColumnDef::new(ProductAssemblies::Notes).string().null())
                        .col(ColumnDef::new(ProductAssemblies::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(ProductAssemblies::StartedBy).uuid().null())
                        .col(optional_timestamp_col(ProductAssemblies::StartedAt))
                        .col(ColumnDef::new(ProductAssemblies::CompletedBy).uuid().null())
                        .col(optional_timestamp_col(ProductAssemblies::CompletedAt))
                        .col(ColumnDef::new(ProductAssemblies::CancelledBy).uuid().null())
                        .col(optional_timestamp_col(ProductAssemblies::CancelledAt))
                        .col(version_col(ProductAssemblies::Version))
                        .col(timestamp_col(ProductAssemblies::CreatedAt))
                        .col(timestamp_col(ProductAssemblies::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BillOfMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BillOfMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BillOfMaterials::AssemblyId).uuid().not_null())
                        .col(
                            ColumnDef::new(BillOfMaterials::RawProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BillOfMaterials::WarehouseId).uuid().not_null())
                        .col(quantity_col(BillOfMaterials::RequiredQuantity))
                        .col(quantity_col(BillOfMaterials::AvailableQuantity))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bill_of_materials_assembly")
                        .table(BillOfMaterials::Table)
                        .col(BillOfMaterials::AssemblyId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BillOfMaterials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductAssemblies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductAssemblies {
        Table,
        Id,
        AssemblyNumber,
        ProductId,
        WarehouseId,
        Quantity,
        Status,
        Notes,
        CreatedBy,
        StartedBy,
        StartedAt,
        CompletedBy,
        CompletedAt,
        CancelledBy,
        CancelledAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BillOfMaterials {
        Table,
        Id,
        AssemblyId,
        RawProductId,
        WarehouseId,
        RequiredQuantity,
        AvailableQuantity,
    }
}

mod m20240301_000006_create_product_request_tables {
    use super::{optional_timestamp_col, quantity_col, timestamp_col, version_col};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_product_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRequests::RequestNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRequests::SourceWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRequests::DestinationWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductRequests::Status).string().not_null())
                        .col(ColumnDef::new(ProductRequests::Notes).string().null())
                        .col(ColumnDef::new(ProductRequests::RequestedBy).uuid().not_null())
                        .col(ColumnDef::new(ProductRequests::ApprovedBy).uuid().null())
                        .col(optional_timestamp_col(ProductRequests::ApprovedAt))
                        .col(ColumnDef::new(ProductRequests::RejectedBy).uuid().null())
                        .col(optional_timestamp_col(ProductRequests::RejectedAt))
                        .col(ColumnDef::new(ProductRequests::RejectionReason).string().null())
                        .col(ColumnDef::new(ProductRequests::CompletedBy).uuid().null())
                        .col(optional_timestamp_col(ProductRequests::CompletedAt))
                        .col(version_col(ProductRequests::Version))
                        .col(timestamp_col(ProductRequests::CreatedAt))
                        .col(timestamp_col(ProductRequests::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductRequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductRequestItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRequestItems::RequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductRequestItems::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(quantity_col(ProductRequestItems::QuantityRequested))
                        .col(
                            ColumnDef::new(ProductRequestItems::QuantityApproved)
                                .decimal_len(16, 4)
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_request_items_request")
                        .table(ProductRequestItems::Table)
                        .col(ProductRequestItems::RequestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductRequestItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductRequests {
        Table,
        Id,
        RequestNumber,
        SourceWarehouseId,
        DestinationWarehouseId,
        Status,
        Notes,
        RequestedBy,
        ApprovedBy,
        ApprovedAt,
        RejectedBy,
        RejectedAt,
        RejectionReason,
        CompletedBy,
        CompletedAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductRequestItems {
        Table,
        Id,
        RequestId,
        ProductId,
        QuantityRequested,
        QuantityApproved,
    }
}
