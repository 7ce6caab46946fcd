use std::sync::LazyLock;

use pq_protocol::EquipmentId;
use regex::Regex;

/// Equipment prefixes used on site (excavators, tippers, dumpers, loaders...).
pub const EQUIPMENT_PREFIXES: [&str; 10] = ["EX", "BB", "TP", "DT", "DP", "PC", "LD", "DZ", "SHV", "HT"];

static EQUIPMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ex|bb|tp|dt|dp|pc|ld|dz|shv|ht)[\-_ ]?(\d{1,5})\b").unwrap()
});

/// Equipment identifiers in first-mention order, normalized to `PREFIX-NUMBER`.
pub fn extract_equipment(text: &str) -> Vec<EquipmentId> {
    let mut found: Vec<EquipmentId> = Vec::new();
    for caps in EQUIPMENT.captures_iter(text) {
        let raw = format!("{}{}", &caps[1], &caps[2]);
        if let Ok(id) = EquipmentId::parse(&raw)
            && !found.contains(&id)
        {
            found.push(id);
        }
    }
    found
}
