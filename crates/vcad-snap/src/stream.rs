//! Geometry streams, parts, objects and the in-memory object store.
//!
//! An object owns a geometry stream: an ordered list of entries, each a
//! primitive or a reference to a shared geometry part. Parts hold their own
//! stream and are instanced one level deep.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Point3, Range3, Transform};

use crate::cache::{ElementGeometryCache, GeometryCacheRegistry};
use crate::error::{Result, SnapError};
use crate::geometry::{GeometricPrimitive, GeometryParams};

/// Identifier of a graphical object or geometry part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Position of a primitive within an object's geometry stream.
///
/// `index` is the entry position in the object stream. Entries read from a
/// part carry the part id and a 1-based `part_index`; the object-level
/// entry that places the part has the part id and `part_index == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryId {
    /// Entry position in the object stream.
    pub index: u16,
    /// Part placed by the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<ElementId>,
    /// Entry position within the part, 1-based.
    #[serde(default)]
    pub part_index: u16,
}

impl EntryId {
    /// Id of a plain object entry.
    pub fn element(index: u16) -> Self {
        Self {
            index,
            part_id: None,
            part_index: 0,
        }
    }

    /// The id as seen at object level, where part entries are not expanded.
    pub fn element_level(&self) -> Self {
        Self {
            part_index: 0,
            ..*self
        }
    }

    /// Whether this entry was read from inside a part.
    pub fn in_part(&self) -> bool {
        self.part_id.is_some() && self.part_index > 0
    }

    /// Key for per-owner caches: the part-local index inside parts, else
    /// the stream index.
    pub fn cache_index(&self) -> u16 {
        if self.in_part() {
            self.part_index
        } else {
            self.index
        }
    }
}

/// What an entry holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryGeometry {
    /// A primitive.
    Primitive(Arc<GeometricPrimitive>),
    /// An instance of a geometry part.
    Part(ElementId),
}

/// One entry of a geometry stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    /// Display attributes.
    #[serde(default)]
    pub params: GeometryParams,
    /// Entry geometry to stream coordinates.
    #[serde(default)]
    pub transform: Transform,
    /// Range of the geometry in its own coordinates, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range3>,
    /// The geometry.
    pub geometry: EntryGeometry,
}

impl StreamEntry {
    /// Primitive entry with default attributes.
    pub fn primitive(geometry: GeometricPrimitive) -> Self {
        Self {
            params: GeometryParams::default(),
            transform: Transform::identity(),
            range: None,
            geometry: EntryGeometry::Primitive(Arc::new(geometry)),
        }
    }

    /// Part instance placed by `transform`.
    pub fn part(id: ElementId, transform: Transform) -> Self {
        Self {
            params: GeometryParams::default(),
            transform,
            range: None,
            geometry: EntryGeometry::Part(id),
        }
    }

    /// Replace the display attributes.
    pub fn with_params(mut self, params: GeometryParams) -> Self {
        self.params = params;
        self
    }
}

/// An ordered list of entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryStream {
    /// Drawn identically in every view (billboards, markers); never snappable.
    #[serde(default)]
    pub view_independent: bool,
    /// The entries.
    pub entries: Vec<StreamEntry>,
}

impl GeometryStream {
    /// Stream of plain primitives.
    pub fn from_primitives(primitives: impl IntoIterator<Item = GeometricPrimitive>) -> Self {
        Self {
            view_independent: false,
            entries: primitives.into_iter().map(StreamEntry::primitive).collect(),
        }
    }
}

/// Shared geometry instanced by objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryPart {
    /// Part id.
    pub id: ElementId,
    /// Part geometry.
    pub stream: GeometryStream,
    /// Range of the whole part, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range3>,
}

/// A graphical object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometricObject {
    /// Object id.
    pub id: ElementId,
    /// Stream coordinates to world.
    #[serde(default)]
    pub placement: Transform,
    /// Placement origin offered to `Origin` snaps, when the object has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_origin: Option<Point3>,
    /// Object geometry.
    pub stream: GeometryStream,
}

/// Resolves ids to geometry and owns per-object caches.
pub trait GeometryProvider: Send + Sync {
    /// The object with `id`.
    fn object(&self, id: ElementId) -> Option<Arc<GeometricObject>>;

    /// The part with `id`.
    fn part(&self, id: ElementId) -> Option<Arc<GeometryPart>>;

    /// The derived-geometry cache owned by object or part `id`.
    fn geometry_cache(&self, id: ElementId) -> Arc<ElementGeometryCache>;
}

/// Objects and parts loaded together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Graphical objects.
    #[serde(default)]
    pub objects: Vec<GeometricObject>,
    /// Geometry parts.
    #[serde(default)]
    pub parts: Vec<GeometryPart>,
}

impl Scene {
    /// Parse a scene from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// In-memory [`GeometryProvider`] that keeps caches coherent with edits.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: RwLock<HashMap<ElementId, Arc<GeometricObject>>>,
    parts: RwLock<HashMap<ElementId, Arc<GeometryPart>>>,
    caches: GeometryCacheRegistry,
}

impl ObjectStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding every object and part of `scene`.
    pub fn from_scene(scene: Scene) -> Self {
        let store = Self::new();
        for part in scene.parts {
            store.insert_part(part);
        }
        for object in scene.objects {
            store.insert(object);
        }
        store
    }

    /// Add or replace an object.
    pub fn insert(&self, object: GeometricObject) {
        let id = object.id;
        let previous = write(&self.objects).insert(id, Arc::new(object));
        if previous.is_some() {
            self.caches.on_updated(id);
        } else {
            self.caches.on_inserted(id);
        }
    }

    /// Replace an existing object's geometry, notifying once the new
    /// geometry is visible.
    pub fn update(&self, object: GeometricObject) -> Result<()> {
        let id = object.id;
        let mut objects = write(&self.objects);
        let slot = objects.get_mut(&id).ok_or(SnapError::UnknownObject(id))?;
        self.caches.on_updated(id);
        *slot = Arc::new(object);
        drop(objects);
        self.caches.on_update_applied(id);
        Ok(())
    }

    /// Remove an object.
    pub fn remove(&self, id: ElementId) -> Option<Arc<GeometricObject>> {
        let removed = write(&self.objects).remove(&id);
        if removed.is_some() {
            self.caches.on_deleted(id);
        }
        removed
    }

    /// Add or replace a part.
    pub fn insert_part(&self, part: GeometryPart) {
        let id = part.id;
        let previous = write(&self.parts).insert(id, Arc::new(part));
        if previous.is_some() {
            self.caches.on_updated(id);
        } else {
            self.caches.on_inserted(id);
        }
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        read(&self.objects).len()
    }

    /// True when the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cache registry, for instrumentation.
    pub fn caches(&self) -> &GeometryCacheRegistry {
        &self.caches
    }
}

impl GeometryProvider for ObjectStore {
    fn object(&self, id: ElementId) -> Option<Arc<GeometricObject>> {
        read(&self.objects).get(&id).cloned()
    }

    fn part(&self, id: ElementId) -> Option<Arc<GeometryPart>> {
        read(&self.parts).get(&id).cloned()
    }

    fn geometry_cache(&self, id: ElementId) -> Arc<ElementGeometryCache> {
        self.caches.get_or_create(id)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
