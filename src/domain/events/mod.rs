//! Domain events
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    LineAdded { user_id: Uuid, line_id: Uuid, product_id: Uuid, amount: i32 },
    LineReduced { user_id: Uuid, line_id: Uuid, product_id: Uuid, amount: i32 },
    LineAmountSet { user_id: Uuid, line_id: Uuid, amount: i32 },
    LineRemoved { user_id: Uuid, line_id: Uuid },
    CartCleared { user_id: Uuid, removed: u64 },
}

impl CartEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LineAdded { .. } => "line_added",
            Self::LineReduced { .. } => "line_reduced",
            Self::LineAmountSet { .. } => "line_amount_set",
            Self::LineRemoved { .. } => "line_removed",
            Self::CartCleared { .. } => "cart_cleared",
        }
    }
}
