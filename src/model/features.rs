//! Well-known feature names used by the shipped node kinds

/// Display name of a node
pub const NAME: &str = "name";
/// Stable address of a root document, used for proxy resolution
pub const URI: &str = "uri";

/// Form items held by a form item container (Form, Table, FormGroup)
pub const ITEMS: &str = "items";
/// Form attributes declared on a Form
pub const ATTRIBUTES: &str = "attributes";
/// Data path bound to a Table or FormField
pub const DATA_PATH: &str = "data_path";
/// Segments of a data path
pub const SEGMENTS: &str = "segments";
/// Extended info of a FormAttribute or FormGroup
pub const EXT_INFO: &str = "ext_info";
/// Main table of a dynamic list (cross reference, usually a proxy)
pub const MAIN_TABLE: &str = "main_table";
/// Fields of a database view definition
pub const FIELDS: &str = "fields";

/// Code module attached to a Form
pub const MODULE: &str = "module";
/// Module type (`common`, `object`, `manager`, `form`)
pub const MODULE_TYPE: &str = "module_type";
/// Methods declared in a module
pub const METHODS: &str = "methods";
/// Statements of interest inside a method
pub const STATEMENTS: &str = "statements";
/// Keyword spelling of a self reference
pub const KEYWORD: &str = "keyword";
/// Property accessed through a self reference
pub const PROPERTY: &str = "property";
/// Source line of a code element (1-based)
pub const LINE: &str = "line";
/// Whether a method is exported
pub const EXPORT: &str = "export";

const SINGLE_VALUED: &[&str] = &[DATA_PATH, EXT_INFO, MODULE, MAIN_TABLE];

/// Check whether a containment feature holds at most one node
pub fn is_single_valued(feature: &str) -> bool {
    SINGLE_VALUED.contains(&feature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_valued_features() {
        assert!(is_single_valued(DATA_PATH));
        assert!(is_single_valued(EXT_INFO));
        assert!(!is_single_valued(ITEMS));
        assert!(!is_single_valued("unknown"));
    }
}
