//! Production-center filtering.
//!
//! An order may be routed through several (production center, cutting room,
//! destination) combinations. Once one is selected, a table is shown when it
//! carries exactly that combination or has none assigned yet.

use std::collections::BTreeSet;

use cutplan_client::Combination;
use cutplan_core::PlannerConfig;
use serde::Serialize;

use crate::model::{PlanningRow, Table, TableHeader};
use crate::store::TableStore;

/// Distinct values offered by the filter tabs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub production_centers: Vec<String>,
    pub cutting_rooms: Vec<String>,
    pub destinations: Vec<String>,
}

impl FilterOptions {
    pub fn from_combinations(combinations: &[Combination]) -> Self {
        fn distinct<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
            values
                .filter(|v| !v.is_empty())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }
        Self {
            production_centers: distinct(combinations.iter().map(|c| &c.production_center)),
            cutting_rooms: distinct(combinations.iter().map(|c| &c.cutting_room)),
            destinations: distinct(combinations.iter().map(|c| &c.destination)),
        }
    }

    /// Destinations reachable from one cutting room.
    pub fn destinations_for(combinations: &[Combination], cutting_room: &str) -> Vec<String> {
        let set: BTreeSet<String> = combinations
            .iter()
            .filter(|c| c.cutting_room == cutting_room)
            .map(|c| c.destination.clone())
            .collect();
        set.into_iter().collect()
    }
}

/// How an order's tables are fetched, given its combinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// No routing known: fetch every table.
    Unfiltered,
    /// Exactly one sensible routing: fetch filtered by it.
    AutoSelect(Combination),
    /// Several destinations are possible; the user picks.
    AwaitUser,
}

pub fn decide(combinations: &[Combination], config: &PlannerConfig) -> FilterDecision {
    match combinations {
        [] => FilterDecision::Unfiltered,
        [only] => FilterDecision::AutoSelect(only.clone()),
        [first, ..] => {
            let rooms = FilterOptions::from_combinations(combinations).cutting_rooms;
            match rooms.as_slice() {
                [room] if config.is_multi_destination_room(room) => FilterDecision::AwaitUser,
                [_] => FilterDecision::AutoSelect(first.clone()),
                _ => FilterDecision::AwaitUser,
            }
        }
    }
}

pub fn needs_user_filter(combinations: &[Combination], config: &PlannerConfig) -> bool {
    decide(combinations, config) == FilterDecision::AwaitUser
}

/// Without a selection every table is visible.
pub fn is_visible(header: &TableHeader, selected: Option<&Combination>) -> bool {
    match selected {
        None => true,
        Some(c) => header.is_unassigned() || header.matches(c),
    }
}

pub fn visible_tables<R: PlanningRow>(store: &TableStore<R>, selected: Option<&Combination>) -> Vec<Table<R>> {
    store
        .tables()
        .into_iter()
        .filter(|t| is_visible(&t.header, selected))
        .collect()
}

/// Set the combination of the given tables. Returns how many changed;
/// assigning the same combination twice changes nothing the second time.
pub fn assign<R: PlanningRow>(store: &TableStore<R>, table_ids: &[String], combination: &Combination) -> usize {
    let ids: BTreeSet<&str> = table_ids.iter().map(String::as_str).collect();
    assign_where(store, |id, _| ids.contains(id), combination)
}

/// Move tables from `old` to `new`. Tables on other combinations, or none,
/// are left alone.
pub fn retarget<R: PlanningRow>(store: &TableStore<R>, old: &Combination, new: &Combination) -> usize {
    assign_where(store, |_, h| h.matches(old), new)
}

fn assign_where<R: PlanningRow>(
    store: &TableStore<R>,
    pick: impl Fn(&str, &TableHeader) -> bool,
    combination: &Combination,
) -> usize {
    store.update_tables(|id, h| {
        if !pick(id, h) || h.matches(combination) {
            return false;
        }
        h.assign(combination);
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MattressRow;
    use crate::store::Family;

    fn combo(pc: &str, room: &str, dest: &str) -> Combination {
        Combination::new(pc, room, dest)
    }

    // ========================================================================
    // Decision
    // ========================================================================

    #[test]
    fn zero_and_one_combination() {
        let config = PlannerConfig::default();
        assert_eq!(decide(&[], &config), FilterDecision::Unfiltered);
        let one = combo("PC1", "ROOM1", "D1");
        assert_eq!(decide(&[one.clone()], &config), FilterDecision::AutoSelect(one));
    }

    #[test]
    fn multi_destination_room_waits_for_user() {
        let config = PlannerConfig::default();
        let combos = [combo("PC1", "ZALLI", "SECTOR1"), combo("PC1", "ZALLI", "SECTOR2")];
        assert_eq!(decide(&combos, &config), FilterDecision::AwaitUser);
        assert!(needs_user_filter(&combos, &config));
    }

    #[test]
    fn single_ordinary_room_auto_selects_first() {
        let config = PlannerConfig::default();
        let combos = [combo("PC1", "ROOM1", "D1"), combo("PC2", "ROOM1", "D2")];
        assert_eq!(decide(&combos, &config), FilterDecision::AutoSelect(combos[0].clone()));
    }

    #[test]
    fn several_rooms_wait_for_user() {
        let config = PlannerConfig::default();
        let combos = [combo("PC1", "ROOM1", "D1"), combo("PC1", "ROOM2", "D1")];
        assert_eq!(decide(&combos, &config), FilterDecision::AwaitUser);
    }

    #[test]
    fn options_are_distinct_and_sorted() {
        let combos = [
            combo("PC2", "ZALLI", "SECTOR2"),
            combo("PC1", "ZALLI", "SECTOR1"),
            combo("PC1", "ROOM1", "SECTOR1"),
        ];
        let opts = FilterOptions::from_combinations(&combos);
        assert_eq!(opts.production_centers, vec!["PC1", "PC2"]);
        assert_eq!(opts.cutting_rooms, vec!["ROOM1", "ZALLI"]);
        assert_eq!(opts.destinations, vec!["SECTOR1", "SECTOR2"]);
        assert_eq!(FilterOptions::destinations_for(&combos, "ROOM1"), vec!["SECTOR1"]);
    }

    // ========================================================================
    // Visibility and assignment
    // ========================================================================

    fn store_with(n: usize) -> (TableStore<MattressRow>, Vec<String>) {
        let store = TableStore::new(Family::Mattress);
        let sizes = vec!["S".to_string()];
        let ids = (0..n)
            .map(|_| store.add_table(&sizes, TableHeader::new(0.02)).unwrap())
            .collect();
        (store, ids)
    }

    #[test]
    fn visible_tables_match_or_are_unassigned() {
        let (store, ids) = store_with(3);
        let a = combo("PC1", "ZALLI", "SECTOR1");
        let b = combo("PC1", "ZALLI", "SECTOR2");
        assign(&store, &ids[..1], &a);
        assign(&store, &ids[1..2], &b);

        let visible: Vec<String> = visible_tables(&store, Some(&a)).into_iter().map(|t| t.id).collect();
        assert_eq!(visible, vec![ids[0].clone(), ids[2].clone()]);
        assert_eq!(visible_tables(&store, None).len(), 3);
    }

    #[test]
    fn assign_is_idempotent() {
        let (store, ids) = store_with(2);
        let a = combo("PC1", "ZALLI", "SECTOR1");
        assert_eq!(assign(&store, &ids, &a), 2);
        assert_eq!(assign(&store, &ids, &a), 0);
        assert!(store.tables().iter().all(|t| t.header.matches(&a)));
    }

    #[test]
    fn retarget_moves_only_old_combination() {
        let (store, ids) = store_with(3);
        let old = combo("PC1", "ZALLI", "SECTOR1");
        let other = combo("PC2", "ROOM1", "D1");
        let new = combo("PC1", "ZALLI", "SECTOR2");
        assign(&store, &ids[..1], &old);
        assign(&store, &ids[1..2], &other);

        assert_eq!(retarget(&store, &old, &new), 1);
        let tables = store.tables();
        assert!(tables[0].header.matches(&new));
        assert!(tables[1].header.matches(&other));
        assert!(tables[2].header.is_unassigned());
    }
}
