//! Filters that scope which persisted objects take part in a pass.

use crate::coerce::NativeValue;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::schema::EntityMetadata;

/// A filter over objects of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Attribute equals a value. `None` matches unset attributes.
    Eq {
        /// Attribute name.
        attribute: String,
        /// Expected value.
        value: Option<NativeValue>,
    },
    /// Attribute equals one of the values.
    In {
        /// Attribute name.
        attribute: String,
        /// Accepted values.
        values: Vec<NativeValue>,
    },
    /// The relationship links to `object`.
    RelatedTo {
        /// Relationship name.
        relationship: String,
        /// Required member.
        object: ObjectId,
    },
    /// Object identity is one of the ids.
    Ids(Vec<ObjectId>),
    /// All sub-predicates hold.
    And(Vec<Predicate>),
    /// Any sub-predicate holds.
    Or(Vec<Predicate>),
    /// The sub-predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `attribute == value`.
    pub fn eq(attribute: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        Self::Eq {
            attribute: attribute.into(),
            value: Some(value.into()),
        }
    }

    /// `attribute` is unset.
    pub fn is_unset(attribute: impl Into<String>) -> Self {
        Self::Eq {
            attribute: attribute.into(),
            value: None,
        }
    }

    /// `attribute in values`.
    pub fn is_in(attribute: impl Into<String>, values: Vec<NativeValue>) -> Self {
        Self::In {
            attribute: attribute.into(),
            values,
        }
    }

    /// `relationship` contains `object`.
    pub fn related_to(relationship: impl Into<String>, object: ObjectId) -> Self {
        Self::RelatedTo {
            relationship: relationship.into(),
            object,
        }
    }

    /// Conjunction of `self` and `other`.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Negation of `self`.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Checks that every name the predicate mentions exists on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPredicate`] naming the first unknown
    /// attribute or relationship.
    pub fn validate(&self, entity: &EntityMetadata) -> CoreResult<()> {
        match self {
            Self::Eq { attribute, .. } | Self::In { attribute, .. } => {
                if entity.attribute(attribute).is_none() {
                    return Err(CoreError::invalid_predicate(format!(
                        "{} has no attribute {attribute}",
                        entity.name()
                    )));
                }
                Ok(())
            }
            Self::RelatedTo { relationship, .. } => {
                if entity.relationship(relationship).is_none() {
                    return Err(CoreError::invalid_predicate(format!(
                        "{} has no relationship {relationship}",
                        entity.name()
                    )));
                }
                Ok(())
            }
            Self::Ids(_) => Ok(()),
            Self::And(parts) | Self::Or(parts) => {
                parts.iter().try_for_each(|p| p.validate(entity))
            }
            Self::Not(inner) => inner.validate(entity),
        }
    }

    /// Evaluates the predicate against one object through `view`.
    pub fn matches(&self, id: ObjectId, view: &dyn ObjectView) -> bool {
        match self {
            Self::Eq { attribute, value } => {
                let current = view.attribute(id, attribute);
                match (current, value) {
                    (None, None) => true,
                    (Some(current), Some(expected)) => same_value(current, expected),
                    _ => false,
                }
            }
            Self::In { attribute, values } => view
                .attribute(id, attribute)
                .is_some_and(|current| values.iter().any(|v| same_value(current, v))),
            Self::RelatedTo {
                relationship,
                object,
            } => view.related(id, relationship).contains(object),
            Self::Ids(ids) => ids.contains(&id),
            Self::And(parts) => parts.iter().all(|p| p.matches(id, view)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(id, view)),
            Self::Not(inner) => !inner.matches(id, view),
        }
    }
}

/// Numeric keys compare by key form so `1` matches `1.0`.
fn same_value(a: &NativeValue, b: &NativeValue) -> bool {
    match (a.key(), b.key()) {
        (Some(left), Some(right)) => left == right,
        _ => a == b,
    }
}

/// Read access a predicate needs to evaluate.
pub trait ObjectView {
    /// Current value of an attribute.
    fn attribute(&self, id: ObjectId, attribute: &str) -> Option<&NativeValue>;

    /// Current members of a relationship.
    fn related(&self, id: ObjectId, relationship: &str) -> &[ObjectId];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDescriptor, RelationshipDescriptor};
    use std::collections::HashMap;

    #[derive(Default)]
    struct View {
        values: HashMap<(ObjectId, String), NativeValue>,
        links: HashMap<(ObjectId, String), Vec<ObjectId>>,
    }

    impl ObjectView for View {
        fn attribute(&self, id: ObjectId, attribute: &str) -> Option<&NativeValue> {
            self.values.get(&(id, attribute.to_string()))
        }

        fn related(&self, id: ObjectId, relationship: &str) -> &[ObjectId] {
            self.links
                .get(&(id, relationship.to_string()))
                .map_or(&[][..], Vec::as_slice)
        }
    }

    fn entity() -> EntityMetadata {
        EntityMetadata::new("User")
            .with_attribute(AttributeDescriptor::integer("remoteID"))
            .with_attribute(AttributeDescriptor::string("name"))
            .with_relationship(RelationshipDescriptor::to_one("company", "Company"))
    }

    #[test]
    fn evaluates_combinators() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let company = ObjectId::new();
        let mut view = View::default();
        view.values.insert((a, "remoteID".into()), NativeValue::Integer(1));
        view.values.insert((b, "remoteID".into()), NativeValue::Integer(2));
        view.values.insert((a, "name".into()), "Ada".into());
        view.links.insert((b, "company".into()), vec![company]);

        let one = Predicate::eq("remoteID", 1);
        assert!(one.matches(a, &view));
        assert!(!one.matches(b, &view));
        assert!(Predicate::eq("remoteID", 1.0).matches(a, &view));
        assert!(Predicate::is_unset("name").matches(b, &view));
        assert!(Predicate::is_in("remoteID", vec![2.into(), 3.into()]).matches(b, &view));
        assert!(Predicate::related_to("company", company).matches(b, &view));
        assert!(Predicate::Ids(vec![a]).matches(a, &view));
        assert!(one.clone().not().matches(b, &view));
        assert!(!one.clone().and(Predicate::Ids(vec![b])).matches(a, &view));
        assert!(Predicate::Or(vec![one, Predicate::Ids(vec![b])]).matches(b, &view));
    }

    #[test]
    fn validation_names_unknown_members() {
        let user = entity();
        assert!(Predicate::eq("name", "x").validate(&user).is_ok());
        assert!(matches!(
            Predicate::eq("age", 3).validate(&user),
            Err(CoreError::InvalidPredicate { .. })
        ));
        assert!(Predicate::related_to("owner", ObjectId::new())
            .not()
            .validate(&user)
            .is_err());
    }
}
