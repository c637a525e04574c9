//! Wire records exchanged with the planning backend.
//!
//! Rows travel flat: every row repeats its table's header fields and the
//! client regroups them by `table_id`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Backend response envelope: `{"success": true, "data": ...}` or
/// `{"success": false, "msg": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub msg: Option<String>,
}

/// One (production center, cutting room, destination) routing of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Combination {
    pub production_center: String,
    pub cutting_room: String,
    pub destination: String,
}

impl Combination {
    pub fn new(
        production_center: impl Into<String>,
        cutting_room: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            production_center: production_center.into(),
            cutting_room: cutting_room.into(),
            destination: destination.into(),
        }
    }
}

/// Query restriction applied to table fetches once a combination is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFilter {
    pub cutting_room: String,
    pub destination: String,
}

impl From<&Combination> for FetchFilter {
    fn from(c: &Combination) -> Self {
        Self {
            cutting_room: c.cutting_room.clone(),
            destination: c.destination.clone(),
        }
    }
}

/// Header fields shared by every row of a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableHeaderRecord {
    pub table_id: String,
    pub production_center: String,
    pub cutting_room: String,
    pub destination: String,
    pub fabric_type: String,
    pub fabric_code: String,
    pub fabric_color: String,
    pub spreading_method: String,
    pub allowance: Option<f64>,
    pub spreading: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MattressKind {
    #[default]
    Mattress,
    Adhesive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MattressRecord {
    #[serde(flatten)]
    pub table: TableHeaderRecord,
    pub row_id: String,
    pub kind: MattressKind,
    pub mattress_name: String,
    pub width: Option<f64>,
    pub marker_name: String,
    pub marker_length: Option<f64>,
    pub efficiency: Option<f64>,
    pub pieces_per_size: BTreeMap<String, u32>,
    pub layers: Option<u32>,
    pub layers_a: Option<u32>,
    pub expected_consumption: Option<f64>,
    pub bagno: String,
    pub status: String,
    pub is_editable: Option<bool>,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlongRecord {
    #[serde(flatten)]
    pub table: TableHeaderRecord,
    pub row_id: String,
    pub collaretto_name: String,
    pub pieces: Option<u32>,
    pub usable_width: Option<f64>,
    pub theoretical_consumption: Option<f64>,
    pub collaretto_width: Option<f64>,
    pub scrap_rolls: Option<u32>,
    pub extra_pct: Option<f64>,
    pub bagno: String,
    pub sizes: String,
    pub is_editable: Option<bool>,
    pub sequence_number: u32,
}

/// Weft and bias rows share a shape; the endpoint tells them apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelRecord {
    #[serde(flatten)]
    pub table: TableHeaderRecord,
    pub row_id: String,
    pub collaretto_name: String,
    pub pieces: Option<u32>,
    pub usable_width: Option<f64>,
    pub gross_length: Option<f64>,
    pub pcs_seam_to_seam: Option<f64>,
    pub collaretto_width: Option<f64>,
    pub scrap_rolls: Option<u32>,
    pub bagno: String,
    pub sizes: String,
    pub is_editable: Option<bool>,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerRecord {
    pub marker_name: String,
    pub marker_width: f64,
    pub marker_length: f64,
    pub efficiency: f64,
    pub pieces_per_size: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadPrintRecord {
    pub pattern: String,
    pub pad_print_color: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    pub created_at: String,
}

/// Everything one explicit save writes back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveBatch {
    pub order_id: String,
    pub mattress: Vec<MattressRecord>,
    pub along: Vec<AlongRecord>,
    pub weft: Vec<PanelRecord>,
    pub bias: Vec<PanelRecord>,
    /// Backend names of rows removed since the last save.
    pub deleted_names: Vec<String>,
    /// Tables removed since the last save; their production-center
    /// assignments are cleaned up server side.
    pub deleted_table_ids: Vec<String>,
}
