use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which sizes of the order a collaretto row covers.
///
/// On the wire this is `"ALL"` or the labels joined with `-`
/// (`"S-M-L"`); the conversion happens only in `from_wire`/`to_wire`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SizeSelection {
    #[default]
    AllSizes,
    SpecificSizes(BTreeSet<String>),
}

impl SizeSelection {
    pub const ALL_WIRE: &'static str = "ALL";

    /// Parse the wire form. Empty input and `ALL` (any case) mean every size.
    pub fn from_wire(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(Self::ALL_WIRE) {
            return SizeSelection::AllSizes;
        }
        let labels: BTreeSet<String> = raw
            .split('-')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if labels.is_empty() {
            SizeSelection::AllSizes
        } else {
            SizeSelection::SpecificSizes(labels)
        }
    }

    /// Wire form with labels in lexical order.
    pub fn to_wire(&self) -> String {
        match self {
            SizeSelection::AllSizes => Self::ALL_WIRE.to_string(),
            SizeSelection::SpecificSizes(labels) => {
                labels.iter().cloned().collect::<Vec<_>>().join("-")
            }
        }
    }

    /// Wire form with labels in the order's own size order (XS-S-M rather
    /// than M-S-XS). Labels the order does not know go last.
    pub fn to_wire_in(&self, order_sizes: &[String]) -> String {
        let SizeSelection::SpecificSizes(labels) = self else {
            return Self::ALL_WIRE.to_string();
        };
        let mut out: Vec<&str> = order_sizes
            .iter()
            .filter(|s| labels.contains(s.as_str()))
            .map(String::as_str)
            .collect();
        out.extend(
            labels
                .iter()
                .filter(|l| !order_sizes.contains(l))
                .map(String::as_str),
        );
        out.join("-")
    }

    pub fn includes(&self, size: &str) -> bool {
        match self {
            SizeSelection::AllSizes => true,
            SizeSelection::SpecificSizes(labels) => labels.contains(size),
        }
    }

    /// Labels that are not sizes of the order.
    pub fn unknown_sizes(&self, order_sizes: &[String]) -> Vec<String> {
        match self {
            SizeSelection::AllSizes => Vec::new(),
            SizeSelection::SpecificSizes(labels) => labels
                .iter()
                .filter(|l| !order_sizes.contains(l))
                .cloned()
                .collect(),
        }
    }
}

impl From<String> for SizeSelection {
    fn from(raw: String) -> Self {
        SizeSelection::from_wire(&raw)
    }
}

impl From<SizeSelection> for String {
    fn from(sel: SizeSelection) -> Self {
        sel.to_wire()
    }
}

impl fmt::Display for SizeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specific(labels: &[&str]) -> SizeSelection {
        SizeSelection::SpecificSizes(labels.iter().map(|s| s.to_string()).collect())
    }

    fn order() -> Vec<String> {
        ["XS", "S", "M", "L"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_all() {
        assert_eq!(SizeSelection::from_wire("ALL"), SizeSelection::AllSizes);
        assert_eq!(SizeSelection::from_wire("all"), SizeSelection::AllSizes);
        assert_eq!(SizeSelection::from_wire(""), SizeSelection::AllSizes);
        assert_eq!(SizeSelection::from_wire(" - "), SizeSelection::AllSizes);
    }

    #[test]
    fn parse_specific() {
        assert_eq!(SizeSelection::from_wire("S-M"), specific(&["S", "M"]));
        assert_eq!(SizeSelection::from_wire(" M - S -"), specific(&["S", "M"]));
    }

    #[test]
    fn wire_follows_order_sizes() {
        let sel = specific(&["M", "XS", "S"]);
        assert_eq!(sel.to_wire(), "M-S-XS");
        assert_eq!(sel.to_wire_in(&order()), "XS-S-M");
        assert_eq!(specific(&["M", "3XL"]).to_wire_in(&order()), "M-3XL");
        assert_eq!(SizeSelection::AllSizes.to_wire_in(&order()), "ALL");
    }

    #[test]
    fn includes_and_unknown() {
        assert!(SizeSelection::AllSizes.includes("L"));
        let sel = specific(&["S", "XXL"]);
        assert!(sel.includes("S"));
        assert!(!sel.includes("M"));
        assert_eq!(sel.unknown_sizes(&order()), vec!["XXL".to_string()]);
    }

    #[test]
    fn serde_uses_wire_form() {
        let json = serde_json::to_string(&specific(&["S", "M"])).unwrap();
        assert_eq!(json, "\"M-S\"");
        let back: SizeSelection = serde_json::from_str("\"ALL\"").unwrap();
        assert_eq!(back, SizeSelection::AllSizes);
    }
}
