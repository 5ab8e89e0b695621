use std::fmt;
use std::rc::{Rc, Weak};

use common::key_index_vec::KeyIndexVec;

use crate::point::{MapSide, Point, PointId};

/// Observer of one point collection.
///
/// Collections hold listeners weakly; dropping the last `Rc` unregisters it.
pub trait PointSetListener {
    /// Points were added, removed or moved.
    fn points_changed(&self, _side: MapSide) {}

    fn selection_changed(&self, _side: MapSide) {}
}

/// Changes recorded by a collection since they were last taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CollectionChanges {
    pub structure: bool,
    pub selection: bool,
}

impl CollectionChanges {
    pub fn is_empty(&self) -> bool {
        !self.structure && !self.selection
    }
}

/// Ordered points of one map.
///
/// Mutations only record pending changes. Only the owning
/// [`LinkManager`](crate::LinkManager) can drain and forward them, so every
/// edit made through it is settled.
///
/// ```compile_fail
/// let mut points = linkage::PointCollection::new(linkage::MapSide::Old);
/// points.take_changes();
/// ```
#[derive(Clone)]
pub struct PointCollection {
    side: MapSide,
    points: KeyIndexVec<PointId, Point>,
    listeners: Vec<Weak<dyn PointSetListener>>,
    suspended: usize,
    pending: CollectionChanges,
}

impl PointCollection {
    pub fn new(side: MapSide) -> Self {
        PointCollection {
            side,
            points: KeyIndexVec::default(),
            listeners: Vec::new(),
            suspended: 0,
            pending: CollectionChanges::default(),
        }
    }

    pub fn side(&self) -> MapSide {
        self.side
    }

    pub fn name(&self) -> &'static str {
        self.side.collection_name()
    }

    pub fn add(&mut self, point: Point) -> PointId {
        let id = point.id;
        assert!(!id.is_nil());
        self.points.push(point);
        self.pending.structure = true;
        id
    }

    pub fn remove(&mut self, id: &PointId) -> Option<Point> {
        let removed = self.points.remove_by_key(id)?;
        self.pending.structure = true;
        Some(removed)
    }

    pub fn remove_selected(&mut self) -> Vec<Point> {
        let removed = self.points.extract_if(|point| point.selected);
        if !removed.is_empty() {
            self.pending.structure = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.pending.structure = true;
    }

    /// First point named `name`, in insertion order.
    pub fn find_by_name(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|point| point.name == name)
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn by_id(&self, id: &PointId) -> Option<&Point> {
        self.points.by_key(id)
    }

    /// Untracked access for the owner; callers record changes themselves.
    pub(crate) fn by_id_mut(&mut self, id: &PointId) -> Option<&mut Point> {
        self.points.by_key_mut(id)
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.points.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Returns false if the id is unknown.
    pub fn set_selected(&mut self, id: &PointId, selected: bool) -> bool {
        let Some(point) = self.points.by_key_mut(id) else {
            return false;
        };
        if point.selected != selected {
            point.selected = selected;
            self.pending.selection = true;
        }
        true
    }

    pub fn set_all_selected(&mut self, selected: bool) {
        self.points
            .iter_mut()
            .for_each(|point| point.selected = selected);
        self.pending.selection = true;
    }

    /// Selects exactly the points for which `select` returns true.
    pub fn select_where(&mut self, mut select: impl FnMut(&Point) -> bool) {
        for point in self.points.iter_mut() {
            point.selected = select(point);
        }
        self.pending.selection = true;
    }

    pub fn selected_count(&self) -> usize {
        self.points.iter().filter(|point| point.selected).count()
    }

    /// The selected point if exactly one is selected.
    pub fn single_selected(&self) -> Option<&Point> {
        let mut selected = self.points.iter().filter(|point| point.selected);
        let first = selected.next()?;
        match selected.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    pub fn add_listener(&mut self, listener: &Rc<dyn PointSetListener>) {
        self.listeners.push(Rc::downgrade(listener));
    }

    pub fn remove_listener(&mut self, listener: &Rc<dyn PointSetListener>) {
        let target = Rc::downgrade(listener);
        self.listeners
            .retain(|registered| !Weak::ptr_eq(registered, &target));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    /// Holds back notifications until the matching
    /// [`activate_listeners`](Self::activate_listeners).
    pub(crate) fn suspend_listeners(&mut self) {
        self.suspended += 1;
    }

    /// Ends one suspension. Ending the outermost one records a single structure change.
    pub(crate) fn activate_listeners(&mut self) {
        if self.suspended == 0 {
            return;
        }
        self.suspended -= 1;
        if self.suspended == 0 {
            self.pending.structure = true;
        }
    }

    pub fn listeners_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Drains recorded changes. Nothing is drained while listeners are suspended.
    pub(crate) fn take_changes(&mut self) -> CollectionChanges {
        if self.listeners_suspended() {
            return CollectionChanges::default();
        }
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn inform_listeners(&mut self, changes: CollectionChanges) {
        if changes.is_empty() || self.listeners_suspended() {
            return;
        }

        self.listeners.retain(|listener| listener.strong_count() > 0);
        let listeners: Vec<Rc<dyn PointSetListener>> = self
            .listeners
            .iter()
            .filter_map(|listener| listener.upgrade())
            .collect();
        for listener in listeners {
            if changes.structure {
                listener.points_changed(self.side);
            }
            if changes.selection {
                listener.selection_changed(self.side);
            }
        }
    }
}

impl fmt::Debug for PointCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointCollection")
            .field("side", &self.side)
            .field("points", &self.points)
            .field("listeners", &self.listener_count())
            .field("suspended", &self.suspended)
            .field("pending", &self.pending)
            .finish()
    }
}
