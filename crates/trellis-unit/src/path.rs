//! Logical path conventions: normalization and the suffix rules that
//! distinguish executable units, their contracts, and structured data.

/// Suffix carried by executable units.
pub const UNIT_SUFFIX: &str = ".unit";
/// Suffix carried by contract units, derived from the unit path.
pub const CONTRACT_SUFFIX: &str = ".test.unit";
/// Suffix carried by structured-data resources.
pub const DATA_SUFFIX: &str = ".json";

/// Canonical form of a logical path: a single leading separator is stripped.
/// Two paths name the same resource iff their normalized strings are equal.
pub fn normalize_path(path: &str) -> String {
    path.strip_prefix('/').unwrap_or(path).to_string()
}

/// Path of the sibling contract unit: the final `.unit` suffix becomes
/// `.test.unit`. Suffixless paths get `.test` appended.
pub fn contract_path(path: &str) -> String {
    match path.strip_suffix(UNIT_SUFFIX) {
        Some(stem) => format!("{stem}{CONTRACT_SUFFIX}"),
        None => format!("{path}.test"),
    }
}

/// True iff the path denotes a structured-data resource, which bypasses
/// the contract machinery entirely.
pub fn is_data_path(path: &str) -> bool {
    path.ends_with(DATA_SUFFIX)
}

/// True iff the path already denotes a contract unit.
pub fn is_contract_path(path: &str) -> bool {
    path.ends_with(CONTRACT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_one_leading_separator() {
        assert_eq!(normalize_path("/framework/flow.unit"), "framework/flow.unit");
        assert_eq!(normalize_path("framework/flow.unit"), "framework/flow.unit");
        // Only a single separator is stripped.
        assert_eq!(normalize_path("//framework"), "/framework");
    }

    #[test]
    fn contract_path_substitutes_suffix() {
        assert_eq!(
            contract_path("framework/service/flow.unit"),
            "framework/service/flow.test.unit"
        );
        assert_eq!(contract_path("framework/raw"), "framework/raw.test");
    }

    #[test]
    fn data_paths_are_recognised() {
        assert!(is_data_path("framework/schema/model.json"));
        assert!(!is_data_path("framework/service/flow.unit"));
    }
}
