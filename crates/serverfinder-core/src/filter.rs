//! Query filters for [`ServerIndex::query`](crate::ServerIndex::query)

/// One query constraint.
///
/// Filters of the same kind are OR'ed together; the name group and the tag
/// group are AND'ed when both are supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Exact match on `Record::name`
    Name(String),
    /// Exact match on one entry of `Record::tags`
    Tag(String),
}

impl Filter {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }
}
