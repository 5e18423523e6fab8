//! Lazily resolved associations
//!
//! Associations are declared as static [`AssociationDescriptor`]s and held
//! by models in typed slots:
//!
//! - [`HasOne`]: always resolves to a model, blank when the source field is
//!   missing
//! - [`BelongsTo`]: resolves to `Option`, from an embedded fragment or by
//!   reference through a loader
//! - [`HasMany`]: resolves to a [`Collection`] built from an array of
//!   fragments
//!
//! Nothing is read from the owner's attributes until first access.

use crate::entity::Entity;
use crate::source::AttributeSource;
use crate::types::{EntityKind, Payload, Record};
use crate::Result;
use serde_json::Value;

/// One or many related models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related model
    One,
    /// A collection of related models
    Many,
}

/// How the related model is stored on the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Sub-object inside the owner's document
    Embedded,
    /// Key pointing at a separately stored record
    Reference,
}

/// Static description of one association
#[derive(Debug, Clone, Copy)]
pub struct AssociationDescriptor {
    /// Association name, also the payload key when nested
    pub name: &'static str,
    /// Related entity type
    pub target: EntityKind,
    /// One or many
    pub cardinality: Cardinality,
    /// Embedded or referenced
    pub strategy: Strategy,
    /// Owner attribute holding the fragment or key
    pub source_field: &'static str,
}

/// Something that can persist a model and report whether it was accepted
///
/// `Ok(false)` means the record was rejected by validation, local or remote,
/// and carries the errors.
pub trait Persist<T> {
    /// Persist a model; `Ok(false)` when it was rejected with errors
    fn save(&mut self, entity: &mut T) -> Result<bool>;
}

/// Fragment under `field`, ignoring objects with nothing but nulls
fn fragment<'a>(owner: &'a Record, field: &str) -> Option<&'a Payload> {
    owner
        .get_object(field)
        .filter(|fragment| fragment.values().any(|value| !value.is_null()))
}

/// Single related model, blank when not present in the owner
#[derive(Debug, Clone)]
pub struct HasOne<T> {
    descriptor: &'static AssociationDescriptor,
    value: Option<T>,
}

impl<T: Entity> HasOne<T> {
    /// Unresolved association for a descriptor
    pub fn new(descriptor: &'static AssociationDescriptor) -> Self {
        Self {
            descriptor,
            value: None,
        }
    }

    /// Declaration of the association
    pub fn descriptor(&self) -> &'static AssociationDescriptor {
        self.descriptor
    }

    /// Resolve on first access
    pub fn resolve(&mut self, owner: &Record) -> &mut T {
        let descriptor = self.descriptor;
        self.value.get_or_insert_with(|| {
            fragment(owner, descriptor.source_field)
                .or_else(|| fragment(owner, descriptor.name))
                .map(|fragment| T::from_fragment(fragment.clone(), owner.is_persisted()))
                .unwrap_or_else(T::blank)
        })
    }

    /// Resolve, treating a new model without values as absent
    pub fn resolve_present(&mut self, owner: &Record) -> Option<&mut T> {
        let value = self.resolve(owner);
        if value.is_new() && value.record().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Resolved value, if any
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Resolved value, mutably
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Replace the value
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Whether the fragment was already read
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Forget the resolved value
    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Unresolved,
    Absent,
    Present(T),
}

/// Optional related model
#[derive(Debug, Clone)]
pub struct BelongsTo<T> {
    descriptor: &'static AssociationDescriptor,
    slot: Slot<T>,
}

impl<T: Entity> BelongsTo<T> {
    /// Unresolved association for a descriptor
    pub fn new(descriptor: &'static AssociationDescriptor) -> Self {
        Self {
            descriptor,
            slot: Slot::Unresolved,
        }
    }

    /// Declaration of the association
    pub fn descriptor(&self) -> &'static AssociationDescriptor {
        self.descriptor
    }

    /// Resolve an embedded association on first access
    ///
    /// Looks at the source field first, then at a fragment stored under the
    /// association name.
    pub fn resolve(&mut self, owner: &Record) -> Option<&mut T> {
        if matches!(self.slot, Slot::Unresolved) {
            let descriptor = self.descriptor;
            self.slot = fragment(owner, descriptor.source_field)
                .or_else(|| fragment(owner, descriptor.name))
                .map(|fragment| Slot::Present(T::from_fragment(fragment.clone(), owner.is_persisted())))
                .unwrap_or(Slot::Absent);
        }
        self.get_mut()
    }

    /// Resolve a referenced association on first access
    ///
    /// The loader is called only when the owner carries a key.
    pub fn resolve_with<F>(&mut self, owner: &Record, loader: F) -> Result<Option<&mut T>>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        if matches!(self.slot, Slot::Unresolved) {
            self.slot = match owner
                .get_str(self.descriptor.source_field)
                .filter(|key| !key.is_empty())
            {
                Some(key) => Slot::Present(loader(key)?),
                None => Slot::Absent,
            };
        }
        Ok(self.get_mut())
    }

    /// Resolved value, if present
    pub fn get(&self) -> Option<&T> {
        match &self.slot {
            Slot::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Resolved value, mutably
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match &mut self.slot {
            Slot::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Replace the association, `None` marking it explicitly absent
    pub fn set(&mut self, value: Option<T>) {
        self.slot = match value {
            Some(value) => Slot::Present(value),
            None => Slot::Absent,
        };
    }

    /// Whether the association was already looked up
    pub fn is_resolved(&self) -> bool {
        !matches!(self.slot, Slot::Unresolved)
    }

    /// Forget the resolved value
    pub fn reset(&mut self) {
        self.slot = Slot::Unresolved;
    }
}

/// Related models stored as an array of fragments
#[derive(Debug, Clone)]
pub struct HasMany<T> {
    descriptor: &'static AssociationDescriptor,
    collection: Option<Collection<T>>,
}

impl<T: Entity> HasMany<T> {
    /// Unresolved association for a descriptor
    pub fn new(descriptor: &'static AssociationDescriptor) -> Self {
        Self {
            descriptor,
            collection: None,
        }
    }

    /// Declaration of the association
    pub fn descriptor(&self) -> &'static AssociationDescriptor {
        self.descriptor
    }

    /// Resolve on first access
    ///
    /// `defaults` are merged into every model later built through the
    /// collection.
    pub fn resolve(&mut self, owner: &Record, defaults: Payload) -> &mut Collection<T> {
        let source_field = self.descriptor.source_field;
        self.collection.get_or_insert_with(|| {
            let members = owner
                .get(source_field)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|item| T::from_fragment(item.clone(), owner.is_persisted()))
                        .collect()
                })
                .unwrap_or_default();
            Collection::new(members, defaults)
        })
    }

    /// Resolved collection, if any
    pub fn get(&self) -> Option<&Collection<T>> {
        self.collection.as_ref()
    }

    /// Whether the members were already read
    pub fn is_resolved(&self) -> bool {
        self.collection.is_some()
    }

    /// Forget the resolved collection
    pub fn reset(&mut self) {
        self.collection = None;
    }
}

/// Members of a has-many association
#[derive(Debug, Clone)]
pub struct Collection<T> {
    members: Vec<T>,
    defaults: Payload,
}

impl<T: Entity> Collection<T> {
    /// Collection of `members`; built members start with `defaults`
    pub fn new(members: Vec<T>, defaults: Payload) -> Self {
        Self { members, defaults }
    }

    /// Member with the given identifier
    pub fn find(&self, id: &str) -> Option<&T> {
        self.members.iter().find(|member| member.id() == Some(id))
    }

    /// Member with the given identifier, mutably
    pub fn find_mut(&mut self, id: &str) -> Option<&mut T> {
        self.members.iter_mut().find(|member| member.id() == Some(id))
    }

    /// New, unsaved member carrying the collection defaults
    ///
    /// Values in `source` win over defaults. The member is not added to
    /// the collection.
    pub fn build<S: AttributeSource + ?Sized>(&self, source: &S) -> T {
        let mut member = T::from_source(source);
        for (name, value) in &self.defaults {
            if member.record().get(name).is_none() {
                member.record_mut().set(name.clone(), value.clone());
            }
        }
        member.record_mut().set_persisted(false);
        member
    }

    /// Build and persist a member, adding it only when the save succeeds
    ///
    /// The returned model carries the errors of a rejected save.
    pub fn create<P, S>(&mut self, persister: &mut P, source: &S) -> Result<T>
    where
        P: Persist<T>,
        S: AttributeSource + ?Sized,
        T: Clone,
    {
        let mut member = self.build(source);
        if persister.save(&mut member)? {
            self.members.push(member.clone());
        }
        Ok(member)
    }

    /// Add an already persisted member
    pub fn push(&mut self, member: T) {
        self.members.push(member);
    }

    /// Whether a member with the same identifier is present
    pub fn contains(&self, entity: &T) -> bool {
        entity.id().is_some_and(|id| self.includes(id))
    }

    /// Whether a member has the identifier
    pub fn includes(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in gateway order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.members.iter()
    }

    /// Attributes every built member starts with
    pub fn defaults(&self) -> &Payload {
        &self.defaults
    }
}

impl<'a, T: Entity> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeRegistry;
    use crate::types::Operation;
    use serde_json::json;

    static CARD: AttributeRegistry = AttributeRegistry {
        kind: EntityKind::CreditCard,
        creatable: &["customer_id", "cardholder_name"],
        updatable: &["cardholder_name"],
        readonly: &["token"],
        nested_excluded: &[],
        operations: &[Operation::Create],
    };

    static OWNER: AttributeRegistry = AttributeRegistry {
        kind: EntityKind::Customer,
        creatable: &["first_name"],
        updatable: &["first_name"],
        readonly: &["id", "credit_cards", "default_card"],
        nested_excluded: &[],
        operations: &[Operation::Find],
    };

    static CARDS: AssociationDescriptor = AssociationDescriptor {
        name: "credit_cards",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::Many,
        strategy: Strategy::Embedded,
        source_field: "credit_cards",
    };

    static DEFAULT_CARD: AssociationDescriptor = AssociationDescriptor {
        name: "default_card",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "default_card_details",
    };

    static PLAN: AssociationDescriptor = AssociationDescriptor {
        name: "plan",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::One,
        strategy: Strategy::Reference,
        source_field: "plan_id",
    };

    #[derive(Debug, Clone)]
    struct Card {
        record: Record,
    }

    impl Entity for Card {
        fn registry() -> &'static AttributeRegistry {
            &CARD
        }

        fn from_record(record: Record) -> Self {
            Self { record }
        }

        fn record(&self) -> &Record {
            &self.record
        }

        fn record_mut(&mut self) -> &mut Record {
            &mut self.record
        }
    }

    /// Accepts cards with a cardholder name and assigns a token
    struct Vault {
        saves: usize,
    }

    impl Persist<Card> for Vault {
        fn save(&mut self, card: &mut Card) -> Result<bool> {
            self.saves += 1;
            if card.get("cardholder_name").is_none() {
                card.record_mut().errors_mut().add("cardholder_name", "can't be blank");
                return Ok(false);
            }
            let mut document = card.record().attributes().clone();
            document.insert("token".into(), json!(format!("tok{}", self.saves)));
            card.load(document);
            Ok(true)
        }
    }

    fn owner() -> Record {
        let document = json!({
            "id": "cust1",
            "credit_cards": [
                {"token": "a", "cardholder_name": "A"},
                {"token": "b", "cardholder_name": "B"}
            ],
            "default_card_details": {"token": null, "cardholder_name": null}
        });
        Record::new(&OWNER, document.as_object().cloned().unwrap(), true)
    }

    fn defaults() -> Payload {
        json!({"customer_id": "cust1"}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_has_many_resolves_persisted_members() {
        let owner = owner();
        let mut cards = HasMany::<Card>::new(&CARDS);
        assert!(!cards.is_resolved());

        let collection = cards.resolve(&owner, defaults());
        assert_eq!(collection.len(), 2);
        assert!(collection.includes("b"));
        assert!(collection.find("a").unwrap().is_persisted());
    }

    #[test]
    fn test_build_applies_defaults() {
        let owner = owner();
        let mut cards = HasMany::<Card>::new(&CARDS);
        let collection = cards.resolve(&owner, defaults());

        let card = collection.build(&json!({"cardholder_name": "foo bar"}));
        assert!(card.is_new());
        assert_eq!(card.get("customer_id"), Some(&json!("cust1")));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_build_keeps_supplied_values_over_defaults() {
        let owner = owner();
        let mut cards = HasMany::<Card>::new(&CARDS);
        let collection = cards.resolve(&owner, defaults());

        let card = collection.build(&json!({"customer_id": "other"}));
        assert_eq!(card.get("customer_id"), Some(&json!("other")));

        let card = collection.build(&json!({"customer_id": null}));
        assert_eq!(card.get("customer_id"), Some(&json!("cust1")));
    }

    #[test]
    fn test_create_appends_only_on_success() {
        let owner = owner();
        let mut cards = HasMany::<Card>::new(&CARDS);
        let collection = cards.resolve(&owner, defaults());
        let mut vault = Vault { saves: 0 };

        let created = collection.create(&mut vault, &json!({"cardholder_name": "C"})).unwrap();
        assert!(created.is_persisted());
        assert!(collection.contains(&created));

        let rejected = collection.create(&mut vault, &json!({})).unwrap();
        assert!(rejected.is_new());
        assert!(!collection.contains(&rejected));
        assert_eq!(rejected.errors().on("cardholder_name"), ["can't be blank"]);
        assert_eq!(collection.len(), 3);
    }

    #[test]
    fn test_has_one_is_blank_for_null_fragment() {
        let owner = owner();
        let mut default_card = HasOne::<Card>::new(&DEFAULT_CARD);
        let card = default_card.resolve(&owner);
        assert!(card.is_new());
        assert!(card.id().is_none());
        assert!(default_card.resolve_present(&owner).is_none());

        default_card.get_mut().unwrap().set("cardholder_name", "Foo");
        assert!(default_card.resolve_present(&owner).is_some());
    }

    #[test]
    fn test_belongs_to_falls_back_to_association_name() {
        let attributes = json!({"default_card": {"cardholder_name": "Foo"}});
        let owner = Record::new(&OWNER, attributes.as_object().cloned().unwrap(), false);
        let mut card = BelongsTo::<Card>::new(&DEFAULT_CARD);

        let resolved = card.resolve(&owner).unwrap();
        assert!(resolved.is_new());
        assert_eq!(resolved.get("cardholder_name"), Some(&json!("Foo")));

        card.set(None);
        assert!(card.resolve(&owner).is_none());
        card.reset();
        assert!(card.resolve(&owner).is_some());
    }

    #[test]
    fn test_reference_loader_runs_once() {
        let attributes = json!({"plan_id": "gold"});
        let owner = Record::new(&OWNER, attributes.as_object().cloned().unwrap(), true);
        let mut plan = BelongsTo::<Card>::new(&PLAN);
        let mut calls = 0;

        for _ in 0..2 {
            let loaded = plan
                .resolve_with(&owner, |key| {
                    calls += 1;
                    let document = json!({"token": key});
                    Ok(Card::from_document(document.as_object().cloned().unwrap()))
                })
                .unwrap();
            assert_eq!(loaded.unwrap().id(), Some("gold"));
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_reference_without_key_is_absent() {
        let owner = Record::blank(&OWNER);
        let mut plan = BelongsTo::<Card>::new(&PLAN);
        let loaded = plan
            .resolve_with(&owner, |_| Err(crate::Error::Other("unexpected".into())))
            .unwrap();
        assert!(loaded.is_none());
    }
}
