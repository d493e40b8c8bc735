//! Operation flags that gate what a pass may change.

use bitflags::bitflags;

bitflags! {
    /// Mutations a pass is allowed to perform.
    ///
    /// The first three apply to the entity being synced, the relationship
    /// flags to the objects reached through its relationships.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Operations: u8 {
        /// Create objects for new keys.
        const INSERT = 1;
        /// Update objects whose key matches a record.
        const UPDATE = 1 << 1;
        /// Delete scoped objects missing from the batch.
        const DELETE = 1 << 2;
        /// Create related objects.
        const INSERT_RELATIONSHIPS = 1 << 3;
        /// Update related objects.
        const UPDATE_RELATIONSHIPS = 1 << 4;
        /// Unlink (and possibly delete) related objects.
        const DELETE_RELATIONSHIPS = 1 << 5;
        /// Everything.
        const ALL = Self::INSERT.bits()
            | Self::UPDATE.bits()
            | Self::DELETE.bits()
            | Self::INSERT_RELATIONSHIPS.bits()
            | Self::UPDATE_RELATIONSHIPS.bits()
            | Self::DELETE_RELATIONSHIPS.bits();
    }
}

impl Default for Operations {
    fn default() -> Self {
        Self::ALL
    }
}

impl Operations {
    const RELATIONSHIPS: Self = Self::INSERT_RELATIONSHIPS
        .union(Self::UPDATE_RELATIONSHIPS)
        .union(Self::DELETE_RELATIONSHIPS);

    /// Operations for objects one relationship away.
    ///
    /// Each relationship flag grants the matching entity flag, and the
    /// relationship flags carry down unchanged.
    ///
    /// ```
    /// use entimap_sync::Operations;
    ///
    /// let ops = Operations::INSERT | Operations::UPDATE_RELATIONSHIPS;
    /// assert_eq!(
    ///     ops.relationship_operations(),
    ///     Operations::UPDATE | Operations::UPDATE_RELATIONSHIPS
    /// );
    /// ```
    #[must_use]
    pub fn relationship_operations(self) -> Self {
        let mut child = self & Self::RELATIONSHIPS;
        if self.contains(Self::INSERT_RELATIONSHIPS) {
            child |= Self::INSERT;
        }
        if self.contains(Self::UPDATE_RELATIONSHIPS) {
            child |= Self::UPDATE;
        }
        if self.contains(Self::DELETE_RELATIONSHIPS) {
            child |= Self::DELETE;
        }
        child
    }

    /// Parses one flag name such as `insert` or `delete_relationships`.
    pub fn parse_name(name: &str) -> Option<Self> {
        let flag = match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "insert" => Self::INSERT,
            "update" => Self::UPDATE,
            "delete" => Self::DELETE,
            "insert_relationships" => Self::INSERT_RELATIONSHIPS,
            "update_relationships" => Self::UPDATE_RELATIONSHIPS,
            "delete_relationships" => Self::DELETE_RELATIONSHIPS,
            "all" => Self::ALL,
            _ => return None,
        };
        Some(flag)
    }

    /// Parses a comma-separated list of flag names.
    pub fn parse_list(list: &str) -> Option<Self> {
        list.split(',')
            .filter(|part| !part.trim().is_empty())
            .try_fold(Self::empty(), |acc, part| Some(acc | Self::parse_name(part)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_default() {
        assert_eq!(Operations::default(), Operations::ALL);
        assert_eq!(Operations::ALL.relationship_operations(), Operations::ALL);
    }

    #[test]
    fn entity_flags_do_not_reach_relationships() {
        let ops = Operations::INSERT | Operations::UPDATE | Operations::DELETE;
        assert!(ops.relationship_operations().is_empty());
    }

    #[test]
    fn relationship_flags_carry_down() {
        let ops = Operations::DELETE_RELATIONSHIPS;
        let child = ops.relationship_operations();
        assert_eq!(child, Operations::DELETE | Operations::DELETE_RELATIONSHIPS);
        assert_eq!(child.relationship_operations(), child);
    }

    #[test]
    fn parse_names() {
        assert_eq!(Operations::parse_name("Insert"), Some(Operations::INSERT));
        assert_eq!(
            Operations::parse_name("delete-relationships"),
            Some(Operations::DELETE_RELATIONSHIPS)
        );
        assert_eq!(Operations::parse_name("upsert"), None);
        assert_eq!(
            Operations::parse_list("insert, update"),
            Some(Operations::INSERT | Operations::UPDATE)
        );
        assert_eq!(Operations::parse_list("insert,bogus"), None);
    }
}
