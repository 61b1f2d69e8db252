//! Virtual composite stores and alias resolution.
//!
//! While the virtualization pass runs, every allocation it decided to track is represented by a
//! [`VirtualObject`]: a fixed number of typed entries that stand in for the allocation's
//! memory. [`VirtualState`] owns these objects and answers the alias question for any IR value:
//! is it (a pinned view of) a still-virtual allocation, or a real value?
//!
//! # Lifecycle
//!
//! ```text
//!  add_virtual ──► Virtual ──set_entry──► Virtual
//!                     │
//!                     └──materialize──► Materialized (entries handed to a CommitAllocation)
//! ```
//!
//! The entry count is fixed at creation. There is no API that grows or shrinks an object.

use std::{collections::HashMap, fmt};

use crate::ir::{Graph, Kind, NodeId, NodeKind};

/// Identifier of a virtual object within one [`VirtualState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualId(usize);

impl VirtualId {
    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VirtualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vobj{}", self.0)
    }
}

/// A single slot of a virtual object: a kind and an optional value.
///
/// `value == None` is the placeholder state: the slot still holds the allocation's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualEntry {
    /// Kind the entry was last written with.
    pub kind: Kind,
    /// Current value, `None` if never written.
    pub value: Option<NodeId>,
}

/// The compiler's model of an allocation that has not been materialized.
#[derive(Debug, Clone)]
pub struct VirtualObject {
    id: VirtualId,
    allocation: NodeId,
    element: Kind,
    entries: Box<[VirtualEntry]>,
    materialized: bool,
}

impl VirtualObject {
    /// Returns the identifier of this object.
    #[must_use]
    pub const fn id(&self) -> VirtualId {
        self.id
    }

    /// Returns the allocation node this object models.
    #[must_use]
    pub const fn allocation(&self) -> NodeId {
        self.allocation
    }

    /// Returns the declared element kind.
    #[must_use]
    pub const fn element_kind(&self) -> Kind {
        self.element
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&VirtualEntry> {
        self.entries.get(index)
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> &[VirtualEntry] {
        &self.entries
    }

    /// Returns `true` once the object has been handed back to real memory.
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.materialized
    }
}

/// Result of alias resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alias {
    /// The value is a still-virtual object.
    Virtual(VirtualId),
    /// The value is real; carries the node that produces it.
    Materialized(NodeId),
}

impl Alias {
    /// Returns the virtual object, if any.
    #[must_use]
    pub const fn as_virtual(self) -> Option<VirtualId> {
        match self {
            Self::Virtual(id) => Some(id),
            Self::Materialized(_) => None,
        }
    }

    /// Returns `true` for [`Alias::Virtual`].
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        matches!(self, Self::Virtual(_))
    }
}

/// All virtual objects of one pass over one graph.
#[derive(Debug, Clone, Default)]
pub struct VirtualState {
    objects: Vec<VirtualObject>,
    by_allocation: HashMap<NodeId, VirtualId>,
}

impl VirtualState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `allocation` as a virtual object with `length` entries.
    ///
    /// Registering the same allocation twice returns the existing object.
    pub fn add_virtual(&mut self, allocation: NodeId, element: Kind, length: usize) -> VirtualId {
        if let Some(&existing) = self.by_allocation.get(&allocation) {
            return existing;
        }

        let id = VirtualId(self.objects.len());
        let entries = vec![
            VirtualEntry {
                kind: element,
                value: None,
            };
            length
        ];
        self.objects.push(VirtualObject {
            id,
            allocation,
            element,
            entries: entries.into_boxed_slice(),
            materialized: false,
        });
        self.by_allocation.insert(allocation, id);
        id
    }

    /// Returns the object with the given ID.
    #[must_use]
    pub fn object(&self, id: VirtualId) -> Option<&VirtualObject> {
        self.objects.get(id.index())
    }

    /// Returns the object tracking `allocation`, materialized or not.
    #[must_use]
    pub fn object_for(&self, allocation: NodeId) -> Option<&VirtualObject> {
        self.by_allocation
            .get(&allocation)
            .and_then(|&id| self.object(id))
    }

    /// Returns the number of objects ever tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no object is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over objects that are still virtual.
    pub fn live_objects(&self) -> impl Iterator<Item = &VirtualObject> {
        self.objects.iter().filter(|o| !o.materialized)
    }

    /// Resolves `value` to its current representation.
    ///
    /// `Pi` nodes are looked through: pinning a value does not change what it refers to.
    #[must_use]
    pub fn resolve(&self, graph: &Graph, value: NodeId) -> Alias {
        let mut current = value;
        while let Some(NodeKind::Pi { value: inner, .. }) = graph.node(current) {
            current = *inner;
        }

        match self.by_allocation.get(&current) {
            Some(&id) if !self.objects[id.index()].materialized => Alias::Virtual(id),
            _ => Alias::Materialized(value),
        }
    }

    /// Writes an entry of a virtual object.
    ///
    /// The store is refused (and nothing changes) if the object is materialized, `index` is out
    /// of range, or `kind` does not fit the object's element kind.
    pub fn set_entry(&mut self, id: VirtualId, index: usize, value: NodeId, kind: Kind) -> bool {
        let Some(object) = self.objects.get_mut(id.index()) else {
            return false;
        };
        if object.materialized || kind.stack_kind() != object.element.stack_kind() {
            return false;
        }
        let Some(entry) = object.entries.get_mut(index) else {
            return false;
        };

        *entry = VirtualEntry {
            kind,
            value: Some(value),
        };
        true
    }

    /// Marks an object as materialized and returns its entry values.
    ///
    /// Returns `None` if the object is unknown or already materialized.
    pub fn materialize(&mut self, id: VirtualId) -> Option<Vec<Option<NodeId>>> {
        let object = self.objects.get_mut(id.index())?;
        if object.materialized {
            return None;
        }
        object.materialized = true;
        Some(object.entries.iter().map(|e| e.value).collect())
    }
}
