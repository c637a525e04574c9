//! Conversion between flat backend records and grouped tables.

use std::collections::HashMap;

use cutplan_client::{AlongRecord, MattressKind, MattressRecord, PanelRecord, TableHeaderRecord};
use cutplan_core::new_id;
use tracing::warn;

use crate::model::{
    format_optional, AlongRow, CollarettoRow, MattressRow, PanelRow, PlanningRow, RowStatus, SizeSelection,
    Spreading, Table, TableHeader,
};
use crate::store::Family;

// ============================================================================
// Records -> tables
// ============================================================================

fn header_from(rec: &TableHeaderRecord, default_allowance: f64) -> TableHeader {
    let spreading = match rec.spreading.as_deref() {
        None | Some("") => Spreading::Manual,
        Some(raw) => Spreading::parse(raw).unwrap_or_else(|_| {
            warn!(table_id = %rec.table_id, spreading = raw, "unknown spreading, using MANUAL");
            Spreading::Manual
        }),
    };
    TableHeader {
        production_center: rec.production_center.clone(),
        cutting_room: rec.cutting_room.clone(),
        destination: rec.destination.clone(),
        fabric_type: rec.fabric_type.clone(),
        fabric_code: rec.fabric_code.clone(),
        fabric_color: rec.fabric_color.clone(),
        spreading_method: rec.spreading_method.clone(),
        allowance: rec.allowance.unwrap_or(default_allowance),
        spreading,
    }
}

/// Group rows by table id. Tables keep the order in which the backend
/// first mentions them; rows are sorted by sequence number.
fn group<T, R: PlanningRow>(
    records: Vec<T>,
    default_allowance: f64,
    split: impl Fn(T) -> (TableHeaderRecord, R),
) -> Vec<Table<R>> {
    let mut tables: Vec<Table<R>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for rec in records {
        let (head, row) = split(rec);
        let idx = *index.entry(head.table_id.clone()).or_insert_with(|| {
            tables.push(Table {
                id: if head.table_id.is_empty() { new_id() } else { head.table_id.clone() },
                header: header_from(&head, default_allowance),
                rows: Vec::new(),
            });
            tables.len() - 1
        });
        tables[idx].rows.push(row);
    }
    for table in &mut tables {
        table.rows.sort_by_key(|r| r.sequence_number());
    }
    tables
}

fn row_id(raw: String) -> String {
    if raw.is_empty() {
        new_id()
    } else {
        raw
    }
}

fn count_text(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn mattress_row(rec: MattressRecord) -> (TableHeaderRecord, MattressRow) {
    let status = RowStatus::parse(&rec.status).unwrap_or_else(|_| {
        warn!(row_id = %rec.row_id, status = %rec.status, "unknown status, using not_ready");
        RowStatus::NotReady
    });
    let row = MattressRow {
        id: row_id(rec.row_id),
        mattress_name: rec.mattress_name,
        width: format_optional(rec.width),
        marker_name: rec.marker_name,
        marker_length: format_optional(rec.marker_length),
        efficiency: format_optional(rec.efficiency),
        pieces_per_size: rec.pieces_per_size,
        layers: count_text(rec.layers),
        layers_a: count_text(rec.layers_a),
        expected_consumption: rec.expected_consumption,
        bagno: rec.bagno,
        status,
        is_editable: rec.is_editable.unwrap_or(true),
        sequence_number: rec.sequence_number,
    };
    (rec.table, row)
}

/// Split mattress records into (mattress, adhesive) tables.
pub fn mattress_tables(
    records: Vec<MattressRecord>,
    default_allowance: f64,
) -> (Vec<Table<MattressRow>>, Vec<Table<MattressRow>>) {
    let (adhesive, mattress): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.kind == MattressKind::Adhesive);
    let fill = |mut tables: Vec<Table<MattressRow>>| {
        for table in &mut tables {
            let allowance = table.header.allowance;
            for row in &mut table.rows {
                if row.expected_consumption.is_none() {
                    row.expected_consumption = row.compute_expected_consumption(allowance);
                }
            }
        }
        tables
    };
    (
        fill(group(mattress, default_allowance, mattress_row)),
        fill(group(adhesive, default_allowance, mattress_row)),
    )
}

pub fn along_tables(records: Vec<AlongRecord>, default_allowance: f64) -> Vec<Table<AlongRow>> {
    group(records, default_allowance, |rec| {
        let mut row = AlongRow {
            id: row_id(rec.row_id),
            collaretto_name: rec.collaretto_name,
            pieces: rec.pieces.unwrap_or(0),
            usable_width: format_optional(rec.usable_width),
            theoretical_consumption: format_optional(rec.theoretical_consumption),
            collaretto_width: format_optional(rec.collaretto_width),
            scrap_rolls: count_text(rec.scrap_rolls),
            extra_pct: format_optional(rec.extra_pct),
            bagno: rec.bagno,
            sizes: SizeSelection::from_wire(&rec.sizes),
            is_editable: rec.is_editable.unwrap_or(true),
            sequence_number: rec.sequence_number,
            ..AlongRow::blank(0)
        };
        row.derive();
        (rec.table, row)
    })
}

pub fn panel_tables(records: Vec<PanelRecord>, default_allowance: f64) -> Vec<Table<PanelRow>> {
    group(records, default_allowance, |rec| {
        let mut row = PanelRow {
            id: row_id(rec.row_id),
            collaretto_name: rec.collaretto_name,
            pieces: rec.pieces.unwrap_or(0),
            usable_width: format_optional(rec.usable_width),
            gross_length: format_optional(rec.gross_length),
            pcs_seam_to_seam: format_optional(rec.pcs_seam_to_seam),
            collaretto_width: format_optional(rec.collaretto_width),
            scrap_rolls: count_text(rec.scrap_rolls),
            bagno: rec.bagno,
            sizes: SizeSelection::from_wire(&rec.sizes),
            is_editable: rec.is_editable.unwrap_or(true),
            sequence_number: rec.sequence_number,
            ..PanelRow::blank(0)
        };
        row.derive();
        (rec.table, row)
    })
}

// ============================================================================
// Tables -> records
// ============================================================================

fn header_record<R>(table: &Table<R>) -> TableHeaderRecord {
    let h = &table.header;
    TableHeaderRecord {
        table_id: table.id.clone(),
        production_center: h.production_center.clone(),
        cutting_room: h.cutting_room.clone(),
        destination: h.destination.clone(),
        fabric_type: h.fabric_type.clone(),
        fabric_code: h.fabric_code.clone(),
        fabric_color: h.fabric_color.clone(),
        spreading_method: h.spreading_method.clone(),
        allowance: Some(h.allowance),
        spreading: Some(h.spreading.as_str().to_string()),
    }
}

/// Lenient number for the wire: anything unparsable travels as null.
fn number(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().replace(',', ".").parse().ok()?;
    v.is_finite().then_some(v)
}

fn count(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

pub fn mattress_records(family: Family, tables: &[Table<MattressRow>]) -> Vec<MattressRecord> {
    let kind = match family {
        Family::Adhesive => MattressKind::Adhesive,
        _ => MattressKind::Mattress,
    };
    tables
        .iter()
        .flat_map(|t| {
            let head = header_record(t);
            t.rows.iter().map(move |r| MattressRecord {
                table: head.clone(),
                row_id: r.id.clone(),
                kind,
                mattress_name: r.mattress_name.clone(),
                width: number(&r.width),
                marker_name: r.marker_name.clone(),
                marker_length: number(&r.marker_length),
                efficiency: number(&r.efficiency),
                pieces_per_size: r.pieces_per_size.clone(),
                layers: count(&r.layers),
                layers_a: count(&r.layers_a),
                expected_consumption: r.expected_consumption,
                bagno: r.bagno.clone(),
                status: r.status.as_str().to_string(),
                is_editable: Some(r.is_editable),
                sequence_number: r.sequence_number,
            })
        })
        .collect()
}

pub fn along_records(tables: &[Table<AlongRow>], order_sizes: &[String]) -> Vec<AlongRecord> {
    tables
        .iter()
        .flat_map(|t| {
            let head = header_record(t);
            t.rows.iter().map(move |r| AlongRecord {
                table: head.clone(),
                row_id: r.id.clone(),
                collaretto_name: r.collaretto_name.clone(),
                pieces: Some(r.pieces),
                usable_width: number(&r.usable_width),
                theoretical_consumption: number(&r.theoretical_consumption),
                collaretto_width: number(&r.collaretto_width),
                scrap_rolls: count(&r.scrap_rolls),
                extra_pct: number(&r.extra_pct),
                bagno: r.bagno.clone(),
                sizes: r.sizes.to_wire_in(order_sizes),
                is_editable: Some(r.is_editable),
                sequence_number: r.sequence_number,
            })
        })
        .collect()
}

pub fn panel_records(tables: &[Table<PanelRow>], order_sizes: &[String]) -> Vec<PanelRecord> {
    tables
        .iter()
        .flat_map(|t| {
            let head = header_record(t);
            t.rows.iter().map(move |r| PanelRecord {
                table: head.clone(),
                row_id: r.id.clone(),
                collaretto_name: r.collaretto_name.clone(),
                pieces: Some(r.pieces),
                usable_width: number(&r.usable_width),
                gross_length: number(&r.gross_length),
                pcs_seam_to_seam: number(&r.pcs_seam_to_seam),
                collaretto_width: number(&r.collaretto_width),
                scrap_rolls: count(&r.scrap_rolls),
                bagno: r.bagno.clone(),
                sizes: r.sizes.to_wire_in(order_sizes),
                is_editable: Some(r.is_editable),
                sequence_number: r.sequence_number,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mattress_rec(table_id: &str, row_id: &str, seq: u32, kind: MattressKind) -> MattressRecord {
        MattressRecord {
            table: TableHeaderRecord {
                table_id: table_id.into(),
                fabric_code: "F001".into(),
                ..Default::default()
            },
            row_id: row_id.into(),
            kind,
            sequence_number: seq,
            ..Default::default()
        }
    }

    #[test]
    fn groups_by_table_and_sorts_rows() {
        let records = vec![
            mattress_rec("t1", "r3", 3, MattressKind::Mattress),
            mattress_rec("t2", "r9", 1, MattressKind::Mattress),
            mattress_rec("t1", "r1", 1, MattressKind::Mattress),
            mattress_rec("t3", "a1", 1, MattressKind::Adhesive),
        ];
        let (mattress, adhesive) = mattress_tables(records, 0.02);

        assert_eq!(mattress.len(), 2);
        assert_eq!(mattress[0].id, "t1");
        let rows: Vec<&str> = mattress[0].rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rows, vec!["r1", "r3"]);
        assert_eq!(mattress[1].id, "t2");

        assert_eq!(adhesive.len(), 1);
        assert_eq!(adhesive[0].rows[0].id, "a1");
    }

    #[test]
    fn header_defaults() {
        let (mattress, _) = mattress_tables(vec![mattress_rec("t1", "r1", 1, MattressKind::Mattress)], 0.02);
        let h = &mattress[0].header;
        assert_eq!(h.allowance, 0.02);
        assert_eq!(h.spreading, Spreading::Manual);
        assert_eq!(h.fabric_code, "F001");
        assert!(mattress[0].rows[0].is_editable);
    }

    #[test]
    fn missing_consumption_is_derived() {
        let mut rec = mattress_rec("t1", "r1", 1, MattressKind::Mattress);
        rec.marker_length = Some(6.3);
        rec.layers = Some(10);
        let (mattress, _) = mattress_tables(vec![rec], 0.02);
        assert_eq!(mattress[0].rows[0].layers, "10");
        assert_eq!(mattress[0].rows[0].expected_consumption, Some(63.2));
    }

    #[test]
    fn along_rows_are_derived_on_load() {
        let rec = AlongRecord {
            table: TableHeaderRecord {
                table_id: "c1".into(),
                ..Default::default()
            },
            row_id: "r1".into(),
            pieces: Some(200),
            usable_width: Some(150.0),
            theoretical_consumption: Some(0.5),
            collaretto_width: Some(20.0),
            scrap_rolls: Some(1),
            sizes: "S-M".into(),
            ..Default::default()
        };
        let tables = along_tables(vec![rec], 0.02);
        let row = &tables[0].rows[0];
        assert_eq!(row.rolls, 74);
        assert_eq!(row.meters_collaretto, 100.0);
        assert_eq!(row.sizes, SizeSelection::from_wire("M-S"));
    }

    #[test]
    fn records_carry_header_and_wire_sizes() {
        let mut table: Table<PanelRow> = Table::new(TableHeader::new(0.02));
        table.header.cutting_room = "ZALLI".into();
        table.rows[0].sizes = SizeSelection::from_wire("M-XS");
        table.rows[0].usable_width = "150".into();
        table.rows[0].scrap_rolls = "x".into();

        let order: Vec<String> = ["XS", "S", "M"].iter().map(|s| s.to_string()).collect();
        let recs = panel_records(&[table.clone()], &order);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].table.table_id, table.id);
        assert_eq!(recs[0].table.cutting_room, "ZALLI");
        assert_eq!(recs[0].table.spreading.as_deref(), Some("MANUAL"));
        assert_eq!(recs[0].sizes, "XS-M");
        assert_eq!(recs[0].usable_width, Some(150.0));
        assert_eq!(recs[0].scrap_rolls, None);
    }

    #[test]
    fn adhesive_records_keep_their_kind() {
        let table: Table<MattressRow> = Table::new(TableHeader::new(0.02));
        let recs = mattress_records(Family::Adhesive, &[table]);
        assert_eq!(recs[0].kind, MattressKind::Adhesive);
        assert_eq!(recs[0].status, "not_ready");
    }
}
