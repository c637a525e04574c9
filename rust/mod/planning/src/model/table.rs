use cutplan_client::Combination;
use cutplan_core::{new_id, PlanningError};
use serde::{Deserialize, Serialize};

/// Behaviour every row family shares so one store can hold any of them.
pub trait PlanningRow: Clone + Send + Sync + 'static {
    /// A fresh editable row with a new id.
    fn blank(sequence_number: u32) -> Self;
    fn id(&self) -> &str;
    /// Backend name; empty until the row has been saved once.
    fn backend_name(&self) -> &str;
    fn bagno(&self) -> &str;
    fn sequence_number(&self) -> u32;
    fn is_editable(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Spreading {
    #[default]
    Manual,
    Automatic,
}

impl Spreading {
    pub fn as_str(&self) -> &'static str {
        match self {
            Spreading::Manual => "MANUAL",
            Spreading::Automatic => "AUTOMATIC",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PlanningError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(Spreading::Manual),
            "AUTOMATIC" => Ok(Spreading::Automatic),
            other => Err(PlanningError::Validation(format!(
                "unknown spreading '{}'",
                other
            ))),
        }
    }
}

/// Table-level attributes shared by all rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHeader {
    pub production_center: String,
    pub cutting_room: String,
    pub destination: String,
    pub fabric_type: String,
    pub fabric_code: String,
    pub fabric_color: String,
    pub spreading_method: String,
    /// Extra meters per layer added to the marker length.
    pub allowance: f64,
    pub spreading: Spreading,
}

impl TableHeader {
    pub fn new(allowance: f64) -> Self {
        Self {
            production_center: String::new(),
            cutting_room: String::new(),
            destination: String::new(),
            fabric_type: String::new(),
            fabric_code: String::new(),
            fabric_color: String::new(),
            spreading_method: String::new(),
            allowance,
            spreading: Spreading::Manual,
        }
    }

    /// No production center assigned yet.
    pub fn is_unassigned(&self) -> bool {
        self.production_center.is_empty() && self.cutting_room.is_empty() && self.destination.is_empty()
    }

    pub fn matches(&self, c: &Combination) -> bool {
        self.production_center == c.production_center
            && self.cutting_room == c.cutting_room
            && self.destination == c.destination
    }

    pub fn combination(&self) -> Combination {
        Combination::new(
            self.production_center.clone(),
            self.cutting_room.clone(),
            self.destination.clone(),
        )
    }

    pub fn assign(&mut self, c: &Combination) {
        self.production_center = c.production_center.clone();
        self.cutting_room = c.cutting_room.clone();
        self.destination = c.destination.clone();
    }
}

/// Table-level fields a user can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableField {
    FabricType,
    FabricCode,
    FabricColor,
    SpreadingMethod,
    Allowance,
    Spreading,
}

impl TableField {
    pub fn parse(name: &str) -> Result<Self, PlanningError> {
        Ok(match name {
            "fabric_type" => TableField::FabricType,
            "fabric_code" => TableField::FabricCode,
            "fabric_color" => TableField::FabricColor,
            "spreading_method" => TableField::SpreadingMethod,
            "allowance" => TableField::Allowance,
            "spreading" => TableField::Spreading,
            other => {
                return Err(PlanningError::Validation(format!("unknown table field '{}'", other)))
            }
        })
    }
}

impl TableHeader {
    pub fn set_field(&mut self, field: TableField, value: &str) -> Result<(), PlanningError> {
        match field {
            TableField::FabricType => self.fabric_type = value.to_string(),
            TableField::FabricCode => self.fabric_code = value.to_string(),
            TableField::FabricColor => self.fabric_color = value.to_string(),
            TableField::SpreadingMethod => self.spreading_method = value.to_string(),
            TableField::Allowance => {
                let v: f64 = value
                    .trim()
                    .replace(',', ".")
                    .parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| {
                        PlanningError::Validation(format!("invalid allowance '{}'", value))
                    })?;
                self.allowance = v;
            }
            TableField::Spreading => self.spreading = Spreading::parse(value)?,
        }
        Ok(())
    }
}

/// A group of rows cut from the same fabric for one routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<R> {
    pub id: String,
    pub header: TableHeader,
    pub rows: Vec<R>,
}

impl<R: PlanningRow> Table<R> {
    /// New table holding a single blank row.
    pub fn new(header: TableHeader) -> Self {
        Self {
            id: new_id(),
            header,
            rows: vec![R::blank(1)],
        }
    }

    pub fn row(&self, row_id: &str) -> Option<&R> {
        self.rows.iter().find(|r| r.id() == row_id)
    }

    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut R> {
        self.rows.iter_mut().find(|r| r.id() == row_id)
    }

    /// `max(existing) + 1`, so numbers stay unique after removals.
    pub fn next_sequence_number(&self) -> u32 {
        self.rows.iter().map(R::sequence_number).max().unwrap_or(0) + 1
    }

    pub fn has_locked_rows(&self) -> bool {
        self.rows.iter().any(|r| !r.is_editable())
    }

    /// Distinct non-empty bagni of the table's rows.
    pub fn bagni(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.rows {
            if !r.bagno().is_empty() && !out.iter().any(|b| b == r.bagno()) {
                out.push(r.bagno().to_string());
            }
        }
        out
    }
}
