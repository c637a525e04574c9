use std::sync::{Arc, RwLock};

use cutplan_client::PadPrintRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSize {
    pub size: String,
    pub qty: u32,
}

/// What the user picked in the order selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSelection {
    pub order_id: String,
    pub season: String,
    pub style: String,
    pub color_code: String,
    pub sizes: Vec<OrderSize>,
}

/// The order the session is planning.
///
/// `pad_print` and `brand` arrive after selection from background lookups
/// and stay `None` if those fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderContext {
    pub order_id: String,
    pub season: String,
    pub style: String,
    pub color_code: String,
    pub sizes: Vec<OrderSize>,
    pub pad_print: Option<PadPrintRecord>,
    pub brand: Option<String>,
}

impl OrderContext {
    pub fn from_selection(sel: OrderSelection) -> Self {
        Self {
            order_id: sel.order_id,
            season: sel.season,
            style: sel.style,
            color_code: sel.color_code,
            sizes: sel.sizes,
            pad_print: None,
            brand: None,
        }
    }

    pub fn is_selected(&self) -> bool {
        !self.order_id.is_empty()
    }

    /// Size labels in order.
    pub fn order_size_names(&self) -> Vec<String> {
        self.sizes.iter().map(|s| s.size.clone()).collect()
    }
}

/// Order context shared by the session, its stores and background lookups.
pub type SharedOrder = Arc<RwLock<OrderContext>>;
