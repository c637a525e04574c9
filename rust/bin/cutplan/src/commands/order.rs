//! Order lookup commands.

use anyhow::Result;
use cutplan_client::PlanningApi;
use cutplan_core::PlannerConfig;
use cutplan_planning::filter::{self, FilterDecision};

/// `cutplan combinations --order O`
pub async fn combinations(
    api: &dyn PlanningApi,
    config: &PlannerConfig,
    order_id: &str,
    json_output: bool,
) -> Result<()> {
    let combos = api.combinations(order_id).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&combos)?);
        return Ok(());
    }

    if combos.is_empty() {
        println!("No routings for order {}.", order_id);
        return Ok(());
    }
    println!(
        "{:<20} {:<20} {:<20}",
        "PRODUCTION CENTER", "CUTTING ROOM", "DESTINATION"
    );
    for c in &combos {
        println!(
            "{:<20} {:<20} {:<20}",
            c.production_center, c.cutting_room, c.destination
        );
    }
    println!();
    match filter::decide(&combos, config) {
        FilterDecision::Unfiltered => println!("Tables load unfiltered."),
        FilterDecision::AutoSelect(c) => {
            println!("Auto-selected: {} / {}", c.cutting_room, c.destination)
        }
        FilterDecision::AwaitUser => {
            println!("Pass --cutting-room and --destination to `cutplan plan`.")
        }
    }
    Ok(())
}
