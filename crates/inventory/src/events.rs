use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_events::Event;

use crate::movement::StockMovement;

/// Audit events published after a posting commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    MovementPosted(MovementPosted),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPosted {
    pub movement: StockMovement,
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::MovementPosted(_) => "inventory.movement.posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::MovementPosted(e) => e.movement.created_at(),
        }
    }
}
