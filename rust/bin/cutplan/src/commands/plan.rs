//! `cutplan plan`: load an order's tables through a planning session.

use std::sync::Arc;

use anyhow::Result;
use cutplan_client::PlanningApi;
use cutplan_core::PlannerConfig;
use cutplan_planning::model::{OrderSelection, OrderSize, PlanningRow, Table};
use cutplan_planning::{OrderPhase, PlanningSession, PlanningSnapshot};
use tracing::info;

pub struct PlanRequest {
    pub order: String,
    pub season: String,
    pub style: String,
    pub color: String,
    pub sizes: Vec<String>,
    pub cutting_room: Option<String>,
    pub destination: Option<String>,
}

pub async fn run(
    api: Arc<dyn PlanningApi>,
    config: PlannerConfig,
    req: PlanRequest,
    json_output: bool,
) -> Result<()> {
    let session = PlanningSession::new(config, api);
    let selection = OrderSelection {
        order_id: req.order.clone(),
        season: req.season,
        style: req.style,
        color_code: req.color,
        sizes: req
            .sizes
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|size| OrderSize { size, qty: 0 })
            .collect(),
    };

    let mut phase = session.select_order(Some(selection)).await;
    if phase == OrderPhase::MultiPathWaitingForFilter {
        let (Some(room), Some(dest)) = (req.cutting_room, req.destination) else {
            let options = session.filter_options();
            anyhow::bail!(
                "Order {} has several routings. Pass --cutting-room ({}) and --destination ({}).",
                req.order,
                options.cutting_rooms.join(", "),
                options.destinations.join(", ")
            );
        };
        let combination = session
            .state()
            .combinations
            .into_iter()
            .find(|c| c.cutting_room == room && c.destination == dest)
            .ok_or_else(|| anyhow::anyhow!("No routing {} / {} for order {}.", room, dest, req.order))?;
        session.apply_filter(combination).await?;
        phase = session.phase();
    }
    info!(order = %req.order, ?phase, "order loaded");

    let snapshot = session.snapshot();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot);
    }

    if let Some(error) = snapshot.state.error {
        anyhow::bail!("Loading tables failed: {}", error);
    }
    Ok(())
}

fn print_summary(snapshot: &PlanningSnapshot) {
    println!("Order: {}", snapshot.order.order_id);
    if let Some(c) = &snapshot.state.selected {
        println!(
            "Routing: {} / {} / {}",
            c.production_center, c.cutting_room, c.destination
        );
    }
    if let Some(brand) = &snapshot.order.brand {
        println!("Brand: {}", brand);
    }
    println!();
    println!(
        "{:<10} {:<38} {:<14} {:<14} {:>5}",
        "FAMILY", "TABLE", "FABRIC", "DESTINATION", "ROWS"
    );
    print_tables("mattress", &snapshot.mattress);
    print_tables("adhesive", &snapshot.adhesive);
    print_tables("along", &snapshot.along);
    print_tables("weft", &snapshot.weft);
    print_tables("bias", &snapshot.bias);
}

fn print_tables<R: PlanningRow>(family: &str, tables: &[Table<R>]) {
    for t in tables {
        println!(
            "{:<10} {:<38} {:<14} {:<14} {:>5}",
            family,
            t.id,
            t.header.fabric_code,
            t.header.destination,
            t.rows.len()
        );
    }
}
