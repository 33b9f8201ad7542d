//! Platform name → catalog platform id

/// Substring patterns checked in order; the first pattern contained in the
/// lowercased platform name wins.
const PLATFORM_IDS: &[(&str, u32)] = &[
    ("ps5", 187),
    ("playstation 5", 187),
    ("ps4", 18),
    ("playstation 4", 18),
    ("pc", 4),
    ("nintendo switch", 7),
    ("switch", 7),
    ("xbox one", 1),
    ("xbox series", 186),
];

/// Catalog platform id for a free-text platform name
pub fn platform_id(name: Option<&str>) -> Option<u32> {
    let key = name?.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    PLATFORM_IDS
        .iter()
        .find(|(pattern, _)| key.contains(pattern))
        .map(|(_, id)| *id)
}
