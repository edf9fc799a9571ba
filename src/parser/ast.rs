// AST for the encoding shorthand

use crate::encoding::SortOrder;

/// One `channel: field` entry as written by the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Binding {
    pub channel: String,
    /// Column name, or a full field identifier.
    pub field: String,
    /// Function wrapped around the field, e.g. `sum` or `bin`.
    pub operator: Option<String>,
    /// Second argument of `bin(field, n)`.
    pub maxbins: Option<u32>,
    pub sort: Option<SortOrder>,
    pub domain: Option<Vec<String>>,
}

impl Binding {
    pub fn is_bin(&self) -> bool {
        self.operator
            .as_deref()
            .map(|op| op.eq_ignore_ascii_case("bin"))
            .unwrap_or(false)
    }
}
