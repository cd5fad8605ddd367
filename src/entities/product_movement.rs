use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    Purchase,
    Sale,
    Assembly,
    Transfer,
    Adjustment,
}

impl MovementType {
    pub const ALL: [MovementType; 5] = [
        MovementType::Purchase,
        MovementType::Sale,
        MovementType::Assembly,
        MovementType::Transfer,
        MovementType::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Purchase => "Purchase",
            MovementType::Sale => "Sale",
            MovementType::Assembly => "Assembly",
            MovementType::Transfer => "Transfer",
            MovementType::Adjustment => "Adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Purchase" => Some(MovementType::Purchase),
            "Sale" => Some(MovementType::Sale),
            "Assembly" => Some(MovementType::Assembly),
            "Transfer" => Some(MovementType::Transfer),
            "Adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

/// Sign of a movement's effect on the balance. Quantities are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "In",
            Direction::Out => "Out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "In" => Some(Direction::In),
            "Out" => Some(Direction::Out),
            _ => None,
        }
    }

    /// Applies this direction to a positive quantity.
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

/// Immutable ledger entry. Rows are only ever inserted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub movement_type: String,
    pub direction: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub movement_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        MovementType::from_str(&self.movement_type)
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::from_str(&self.direction)
    }

    /// Quantity with the direction applied; unknown directions count as zero.
    pub fn signed_quantity(&self) -> Decimal {
        self.direction()
            .map(|d| d.signed(self.quantity))
            .unwrap_or(Decimal::ZERO)
    }
}
