//! Projection rewriting: strip lazy columns from an entity's default SELECT.

/// Column list of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// No explicit projection (`SELECT *`)
    All,
    /// Explicit, ordered column list
    Columns(Vec<String>),
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Columns(columns.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, column: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Columns(cols) => cols.iter().any(|c| c == column),
        }
    }

    /// Explicit columns, or `None` for `All`
    pub fn as_columns(&self) -> Option<&[String]> {
        match self {
            Projection::All => None,
            Projection::Columns(cols) => Some(cols),
        }
    }
}

/// Narrow `projection` so it selects none of `lazy`.
///
/// `All` expands to `schema_columns` in schema order minus the lazy names;
/// an explicit list keeps the relative order of what remains.
pub fn rewrite<S: AsRef<str>>(schema_columns: &[S], lazy: &[String], projection: &Projection) -> Projection {
    let is_lazy = |c: &str| lazy.iter().any(|l| l == c);
    match projection {
        Projection::All => Projection::Columns(
            schema_columns
                .iter()
                .map(AsRef::as_ref)
                .filter(|c| !is_lazy(c))
                .map(str::to_string)
                .collect(),
        ),
        Projection::Columns(cols) => Projection::Columns(
            cols.iter().filter(|c| !is_lazy(c)).cloned().collect(),
        ),
    }
}
