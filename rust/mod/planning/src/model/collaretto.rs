use cutplan_core::{new_id, parse_count, parse_positive, round2, PlanningError};
use serde::{Deserialize, Serialize};

use super::sizes::SizeSelection;
use super::table::PlanningRow;

/// Collaretto rows (along, weft, bias): binding tape cut from rolls.
///
/// `pieces` is normally filled by bagno synchronization from the mattress
/// side; everything else derives from the row's own inputs.
pub trait CollarettoRow: PlanningRow {
    type Field: Copy + std::fmt::Debug + Send + Sync + 'static;

    fn set_field(&mut self, field: Self::Field, value: &str) -> Result<(), PlanningError>;
    /// Whether editing `field` changes which mattress pieces the row draws on.
    fn affects_pieces(field: Self::Field) -> bool;
    fn sizes(&self) -> &SizeSelection;
    fn pieces(&self) -> u32;
    fn set_pieces(&mut self, pieces: u32);
    /// Recompute derived columns from inputs.
    fn derive(&mut self);
}

/// `floor(usable_width / (collaretto_width / 10)) - scrap_rolls`.
///
/// Usable width is in cm, collaretto width in mm. Zero when either width
/// is missing. May go negative when scrap exceeds what the fabric yields.
pub fn rolls(usable_width: &str, collaretto_width: &str, scrap_rolls: &str) -> i64 {
    let (Some(usable), Some(width_mm)) =
        (parse_positive(usable_width), parse_positive(collaretto_width))
    else {
        return 0;
    };
    let scrap = parse_count(scrap_rolls).unwrap_or(0) as i64;
    (usable / (width_mm / 10.0)).floor() as i64 - scrap
}

fn parse_pieces(value: &str) -> Result<u32, PlanningError> {
    parse_count(value).ok_or_else(|| PlanningError::Validation(format!("invalid pieces '{}'", value)))
}

// ============================================================================
// Along
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlongField {
    Pieces,
    UsableWidth,
    TheoreticalConsumption,
    CollarettoWidth,
    ScrapRolls,
    ExtraPct,
    Bagno,
    Sizes,
}

impl AlongField {
    pub fn parse(name: &str) -> Result<Self, PlanningError> {
        Ok(match name {
            "pieces" => AlongField::Pieces,
            "usable_width" => AlongField::UsableWidth,
            "theoretical_consumption" => AlongField::TheoreticalConsumption,
            "collaretto_width" => AlongField::CollarettoWidth,
            "scrap_rolls" => AlongField::ScrapRolls,
            "extra_pct" => AlongField::ExtraPct,
            "bagno" => AlongField::Bagno,
            "sizes" => AlongField::Sizes,
            other => {
                return Err(PlanningError::Validation(format!("unknown along field '{}'", other)))
            }
        })
    }
}

/// Collaretto cut along the fabric length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlongRow {
    pub id: String,
    pub collaretto_name: String,
    pub pieces: u32,
    pub usable_width: String,
    /// Meters of tape per piece.
    pub theoretical_consumption: String,
    pub collaretto_width: String,
    pub scrap_rolls: String,
    pub extra_pct: String,
    pub bagno: String,
    pub sizes: SizeSelection,
    pub is_editable: bool,
    pub sequence_number: u32,

    pub rolls: i64,
    pub meters_collaretto: f64,
    pub consumption: f64,
}

impl PlanningRow for AlongRow {
    fn blank(sequence_number: u32) -> Self {
        Self {
            id: new_id(),
            collaretto_name: String::new(),
            pieces: 0,
            usable_width: String::new(),
            theoretical_consumption: String::new(),
            collaretto_width: String::new(),
            scrap_rolls: String::new(),
            extra_pct: String::new(),
            bagno: String::new(),
            sizes: SizeSelection::AllSizes,
            is_editable: true,
            sequence_number,
            rolls: 0,
            meters_collaretto: 0.0,
            consumption: 0.0,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn backend_name(&self) -> &str {
        &self.collaretto_name
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

impl CollarettoRow for AlongRow {
    type Field = AlongField;

    fn set_field(&mut self, field: AlongField, value: &str) -> Result<(), PlanningError> {
        match field {
            AlongField::Pieces => self.pieces = parse_pieces(value)?,
            AlongField::UsableWidth => self.usable_width = value.to_string(),
            AlongField::TheoreticalConsumption => self.theoretical_consumption = value.to_string(),
            AlongField::CollarettoWidth => self.collaretto_width = value.to_string(),
            AlongField::ScrapRolls => self.scrap_rolls = value.to_string(),
            AlongField::ExtraPct => self.extra_pct = value.to_string(),
            AlongField::Bagno => self.bagno = value.trim().to_string(),
            AlongField::Sizes => self.sizes = SizeSelection::from_wire(value),
        }
        self.derive();
        Ok(())
    }

    fn affects_pieces(field: AlongField) -> bool {
        matches!(field, AlongField::Bagno | AlongField::Sizes)
    }

    fn sizes(&self) -> &SizeSelection {
        &self.sizes
    }

    fn pieces(&self) -> u32 {
        self.pieces
    }

    fn set_pieces(&mut self, pieces: u32) {
        self.pieces = pieces;
        self.derive();
    }

    fn derive(&mut self) {
        self.rolls = rolls(&self.usable_width, &self.collaretto_width, &self.scrap_rolls);
        let per_piece = parse_positive(&self.theoretical_consumption).unwrap_or(0.0);
        // Extra may legitimately be zero, so it is not held to positivity.
        let extra = self
            .extra_pct
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        self.meters_collaretto = round2(self.pieces as f64 * per_piece * (1.0 + extra / 100.0));
        self.consumption = if self.rolls > 0 {
            round2(self.meters_collaretto / self.rolls as f64)
        } else {
            0.0
        };
    }
}

// ============================================================================
// Weft / Bias
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelField {
    Pieces,
    UsableWidth,
    GrossLength,
    PcsSeamToSeam,
    CollarettoWidth,
    ScrapRolls,
    Bagno,
    Sizes,
}

impl PanelField {
    pub fn parse(name: &str) -> Result<Self, PlanningError> {
        Ok(match name {
            "pieces" => PanelField::Pieces,
            "usable_width" => PanelField::UsableWidth,
            "gross_length" => PanelField::GrossLength,
            "pcs_seam_to_seam" => PanelField::PcsSeamToSeam,
            "collaretto_width" => PanelField::CollarettoWidth,
            "scrap_rolls" => PanelField::ScrapRolls,
            "bagno" => PanelField::Bagno,
            "sizes" => PanelField::Sizes,
            other => {
                return Err(PlanningError::Validation(format!("unknown panel field '{}'", other)))
            }
        })
    }
}

/// Collaretto cut across the fabric (weft) or on the diagonal (bias) from
/// panels of `gross_length` cm. Both families share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub id: String,
    pub collaretto_name: String,
    pub pieces: u32,
    pub usable_width: String,
    pub gross_length: String,
    /// Pieces one roll yields per panel, seam to seam.
    pub pcs_seam_to_seam: String,
    pub collaretto_width: String,
    pub scrap_rolls: String,
    pub bagno: String,
    pub sizes: SizeSelection,
    pub is_editable: bool,
    pub sequence_number: u32,

    pub rolls: i64,
    pub panels: u32,
    pub consumption: f64,
}

impl PlanningRow for PanelRow {
    fn blank(sequence_number: u32) -> Self {
        Self {
            id: new_id(),
            collaretto_name: String::new(),
            pieces: 0,
            usable_width: String::new(),
            gross_length: String::new(),
            pcs_seam_to_seam: String::new(),
            collaretto_width: String::new(),
            scrap_rolls: String::new(),
            bagno: String::new(),
            sizes: SizeSelection::AllSizes,
            is_editable: true,
            sequence_number,
            rolls: 0,
            panels: 0,
            consumption: 0.0,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn backend_name(&self) -> &str {
        &self.collaretto_name
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

impl CollarettoRow for PanelRow {
    type Field = PanelField;

    fn set_field(&mut self, field: PanelField, value: &str) -> Result<(), PlanningError> {
        match field {
            PanelField::Pieces => self.pieces = parse_pieces(value)?,
            PanelField::UsableWidth => self.usable_width = value.to_string(),
            PanelField::GrossLength => self.gross_length = value.to_string(),
            PanelField::PcsSeamToSeam => self.pcs_seam_to_seam = value.to_string(),
            PanelField::CollarettoWidth => self.collaretto_width = value.to_string(),
            PanelField::ScrapRolls => self.scrap_rolls = value.to_string(),
            PanelField::Bagno => self.bagno = value.trim().to_string(),
            PanelField::Sizes => self.sizes = SizeSelection::from_wire(value),
        }
        self.derive();
        Ok(())
    }

    fn affects_pieces(field: PanelField) -> bool {
        matches!(field, PanelField::Bagno | PanelField::Sizes)
    }

    fn sizes(&self) -> &SizeSelection {
        &self.sizes
    }

    fn pieces(&self) -> u32 {
        self.pieces
    }

    fn set_pieces(&mut self, pieces: u32) {
        self.pieces = pieces;
        self.derive();
    }

    fn derive(&mut self) {
        self.rolls = rolls(&self.usable_width, &self.collaretto_width, &self.scrap_rolls);
        let per_panel = parse_positive(&self.pcs_seam_to_seam).unwrap_or(0.0) * self.rolls as f64;
        self.panels = if per_panel > 0.0 && self.pieces > 0 {
            (self.pieces as f64 / per_panel).ceil() as u32
        } else {
            0
        };
        let gross_cm = parse_positive(&self.gross_length).unwrap_or(0.0);
        self.consumption = round2(self.panels as f64 * gross_cm / 100.0);
    }
}
