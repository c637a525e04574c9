use std::collections::BTreeMap;

use cutplan_client::MarkerRecord;
use cutplan_core::{new_id, parse_count, parse_positive, round2, PlanningError};
use serde::{Deserialize, Serialize};

use super::sizes::SizeSelection;
use super::table::PlanningRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    #[default]
    NotReady,
    Ready,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::NotReady => "not_ready",
            RowStatus::Ready => "ready",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PlanningError> {
        match raw.trim() {
            "not_ready" | "" => Ok(RowStatus::NotReady),
            "ready" => Ok(RowStatus::Ready),
            other => Err(PlanningError::Validation(format!("unknown status '{}'", other))),
        }
    }
}

/// Editable fields of a mattress/adhesive row.
///
/// `layers_a` is missing on purpose: production reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MattressField {
    Width,
    MarkerName,
    MarkerLength,
    Efficiency,
    Layers,
    Bagno,
    Status,
}

impl MattressField {
    pub fn parse(name: &str) -> Result<Self, PlanningError> {
        Ok(match name {
            "width" => MattressField::Width,
            "marker_name" => MattressField::MarkerName,
            "marker_length" => MattressField::MarkerLength,
            "efficiency" => MattressField::Efficiency,
            "layers" => MattressField::Layers,
            "bagno" => MattressField::Bagno,
            "status" => MattressField::Status,
            other => {
                return Err(PlanningError::Validation(format!("unknown mattress field '{}'", other)))
            }
        })
    }
}

/// Follow-up work a field change requires from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEffect {
    pub recompute_consumption: bool,
    /// Layer count changed for the row's bagno.
    pub layers_changed: bool,
    /// Per-size pieces changed for the row's bagno.
    pub pieces_changed: bool,
    /// Bagno was renamed; holds the previous value.
    pub bagno_renamed_from: Option<String>,
}

/// One spread of fabric layers cut with a single marker.
///
/// Numeric inputs are kept as typed so a half-entered value survives;
/// they are parsed when something is derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MattressRow {
    pub id: String,
    pub mattress_name: String,
    pub width: String,
    pub marker_name: String,
    pub marker_length: String,
    pub efficiency: String,
    pub pieces_per_size: BTreeMap<String, u32>,
    pub layers: String,
    pub layers_a: String,
    pub expected_consumption: Option<f64>,
    pub bagno: String,
    pub status: RowStatus,
    pub is_editable: bool,
    pub sequence_number: u32,
}

impl PlanningRow for MattressRow {
    fn blank(sequence_number: u32) -> Self {
        Self {
            id: new_id(),
            mattress_name: String::new(),
            width: String::new(),
            marker_name: String::new(),
            marker_length: String::new(),
            efficiency: String::new(),
            pieces_per_size: BTreeMap::new(),
            layers: String::new(),
            layers_a: String::new(),
            expected_consumption: None,
            bagno: String::new(),
            status: RowStatus::NotReady,
            is_editable: true,
            sequence_number,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn backend_name(&self) -> &str {
        &self.mattress_name
    }

    fn bagno(&self) -> &str {
        &self.bagno
    }

    fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    fn is_editable(&self) -> bool {
        self.is_editable
    }
}

impl MattressRow {
    pub fn set_field(&mut self, field: MattressField, value: &str) -> Result<FieldEffect, PlanningError> {
        let mut effect = FieldEffect::default();
        match field {
            MattressField::Width => {
                if self.width == value {
                    return Ok(effect);
                }
                self.width = value.to_string();
                let had_pieces = !self.pieces_per_size.is_empty();
                self.clear_marker();
                effect.recompute_consumption = true;
                effect.pieces_changed = had_pieces;
            }
            MattressField::MarkerName => self.marker_name = value.to_string(),
            MattressField::MarkerLength => {
                self.marker_length = value.to_string();
                effect.recompute_consumption = true;
            }
            MattressField::Efficiency => self.efficiency = value.to_string(),
            MattressField::Layers => {
                self.layers = value.to_string();
                effect.recompute_consumption = true;
                effect.layers_changed = true;
            }
            MattressField::Bagno => {
                let value = value.trim();
                if self.bagno != value {
                    effect.bagno_renamed_from = Some(std::mem::replace(&mut self.bagno, value.to_string()));
                }
            }
            MattressField::Status => self.status = RowStatus::parse(value)?,
        }
        Ok(effect)
    }

    /// Copy a catalog marker onto the row.
    pub fn apply_marker(&mut self, marker: &MarkerRecord) {
        self.marker_name = marker.marker_name.clone();
        self.marker_length = format_number(marker.marker_length);
        self.efficiency = format_number(marker.efficiency);
        self.pieces_per_size = marker.pieces_per_size.clone();
    }

    pub fn clear_marker(&mut self) {
        self.marker_name.clear();
        self.marker_length.clear();
        self.efficiency.clear();
        self.pieces_per_size.clear();
    }

    /// `(marker_length + allowance) * layers`, or `None` while either
    /// input is not a positive number.
    pub fn compute_expected_consumption(&self, allowance: f64) -> Option<f64> {
        let length = parse_positive(&self.marker_length)?;
        let layers = parse_positive(&self.layers)?;
        Some(round2((length + allowance) * layers))
    }

    /// Piece counts saturate at `u32::MAX` instead of overflowing on
    /// absurd layer or marker values.
    pub fn pieces_per_layer(&self) -> u32 {
        self.pieces_per_size.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    pub fn planned_layers(&self) -> u32 {
        parse_count(&self.layers).unwrap_or(0)
    }

    pub fn actual_layers(&self) -> u32 {
        parse_count(&self.layers_a).unwrap_or(0)
    }

    pub fn planned_pieces(&self) -> u32 {
        self.pieces_per_layer().saturating_mul(self.planned_layers())
    }

    pub fn actual_pieces(&self) -> u32 {
        self.pieces_per_layer().saturating_mul(self.actual_layers())
    }

    /// Planned pieces of the selected sizes only.
    pub fn planned_pieces_for(&self, sizes: &SizeSelection) -> u32 {
        let per_layer: u32 = self
            .pieces_per_size
            .iter()
            .filter(|(size, _)| sizes.includes(size))
            .fold(0, |acc, (_, n)| acc.saturating_add(*n));
        per_layer.saturating_mul(self.planned_layers())
    }
}

/// Render a backend number the way an operator would type it.
pub fn format_number(v: f64) -> String {
    format!("{}", v)
}

pub fn format_optional(v: Option<f64>) -> String {
    v.map(format_number).unwrap_or_default()
}
