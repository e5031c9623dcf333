//! Delivery region selection.

use serde::{Deserialize, Serialize};

use super::id::RegionId;

/// A sales region. Guest sessions and prices are scoped to one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}
