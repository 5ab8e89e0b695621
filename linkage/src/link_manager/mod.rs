use std::fmt;
use std::path::Path;

use common::is_debug;
use glam::DVec2;
use hashbrown::HashSet;

use crate::codec::{self, Compression, LinkRecord, LinkSnapshot, PointRecord};
use crate::config::LinkConfig;
use crate::convex_hull::convex_hull;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::point::{MapSide, Point, PointId, PointStyle};
use crate::point_collection::PointCollection;
use crate::report::{self, Projector, ReportOptions, ReportRow};


/// Owns the points of both maps and the links between them.
///
/// Every mutation goes through the manager so it can settle the pending
/// collection changes: keep link selection in sync, drop links that lost an
/// endpoint, refresh the hulls and notify collection listeners.
#[derive(Clone, Debug)]
pub struct LinkManager {
    config: LinkConfig,
    links: Vec<Link>,
    old_points: PointCollection,
    new_points: PointCollection,
    old_hull: Vec<DVec2>,
    new_hull: Vec<DVec2>,
}

impl Default for LinkManager {
    fn default() -> Self {
        LinkManager::new(LinkConfig::default())
    }
}

impl LinkManager {
    pub fn new(config: LinkConfig) -> Self {
        LinkManager {
            config,
            links: Vec::new(),
            old_points: PointCollection::new(MapSide::Old),
            new_points: PointCollection::new(MapSide::New),
            old_hull: Vec::new(),
            new_hull: Vec::new(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    // === Link Lifecycle ===

    /// Links two existing points.
    ///
    /// Fails if either point already belongs to a link, or is closer than the
    /// coordinate tolerance to the point on the same side of an existing link.
    /// `name` is made unique.
    pub fn add_link(
        &mut self,
        old_point: PointId,
        new_point: PointId,
        name: &str,
        update_hull: bool,
    ) -> Result<&Link> {
        let old = self.old_points.by_id(&old_point).ok_or(Error::UnknownPoint {
            id: old_point,
            side: MapSide::Old,
        })?;
        let new = self.new_points.by_id(&new_point).ok_or(Error::UnknownPoint {
            id: new_point,
            side: MapSide::New,
        })?;

        // NaN coordinates never compare close, so identity is checked first
        if let Some(linked) = self
            .link_for_point(&old_point)
            .or_else(|| self.link_for_point(&new_point))
        {
            return Err(Error::DuplicateCoordinate {
                conflicting_link: linked.name.clone(),
            });
        }

        let tolerance = self.config.coordinate_tolerance;
        let conflict = self.links.iter().find(|link| {
            let old_conflict = self
                .old_points
                .by_id(&link.old_point)
                .is_some_and(|linked| old.is_close(linked, tolerance));
            let new_conflict = self
                .new_points
                .by_id(&link.new_point)
                .is_some_and(|linked| new.is_close(linked, tolerance));
            old_conflict || new_conflict
        });
        if let Some(conflict) = conflict {
            return Err(Error::DuplicateCoordinate {
                conflicting_link: conflict.name.clone(),
            });
        }

        let selected = old.selected || new.selected;
        let name = self.generate_unique_name(name);

        self.set_style(MapSide::Old, &old_point, PointStyle::Linked);
        self.set_style(MapSide::New, &new_point, PointStyle::Linked);

        tracing::debug!("Link \"{name}\" created");
        self.links.push(Link {
            name,
            old_point,
            new_point,
            selected,
        });

        if update_hull {
            self.update_hulls();
        }

        Ok(&self.links[self.links.len() - 1])
    }

    /// Links every old point to the first new point of the same non-empty name.
    /// Pairs that cannot be linked are skipped. Returns the number of new links.
    pub fn link_points_by_name(&mut self) -> usize {
        let pairs: Vec<(PointId, PointId, String)> = self
            .old_points
            .iter()
            .filter(|old| !old.name.is_empty())
            .filter_map(|old| {
                self.new_points
                    .find_by_name(&old.name)
                    .map(|new| (old.id, new.id, old.name.clone()))
            })
            .collect();

        let mut created = 0;
        for (old_point, new_point, name) in pairs {
            match self.add_link(old_point, new_point, &name, false) {
                Ok(_) => created += 1,
                Err(err) => tracing::debug!("Points named \"{name}\" not linked: {err}"),
            }
        }

        self.update_hulls();
        created
    }

    /// Links the single selected old point to the single selected new point.
    ///
    /// Returns `Ok(None)` unless exactly one point is selected on each side.
    pub fn create_link_from_selected_points(&mut self, name: &str) -> Result<Option<&Link>> {
        let old_point = self.old_points.single_selected().map(|point| point.id);
        let new_point = self.new_points.single_selected().map(|point| point.id);
        let (Some(old_point), Some(new_point)) = (old_point, new_point) else {
            return Ok(None);
        };

        if let Err(err) = self.add_link(old_point, new_point, name, true).map(|_| ()) {
            tracing::warn!("Link \"{name}\" rejected: {err}");
            return Err(err);
        }

        Ok(self.links.last())
    }

    /// Removes every link with a selected endpoint. Points are kept.
    pub fn delete_selected_links(&mut self) -> usize {
        let links = std::mem::take(&mut self.links);
        let (removed, kept): (Vec<Link>, Vec<Link>) = links
            .into_iter()
            .partition(|link| self.is_link_selected(link));
        self.links = kept;

        if removed.is_empty() {
            return 0;
        }

        for link in removed.iter() {
            self.unlink_endpoints(link);
        }
        self.update_hulls();

        tracing::info!("Deleted {} selected links", removed.len());
        removed.len()
    }

    /// Removes the selected links and then the selected points of both maps,
    /// or everything if `only_selected` is false.
    pub fn delete_points_and_links(&mut self, only_selected: bool) {
        if only_selected {
            let links = std::mem::take(&mut self.links);
            let (removed, kept): (Vec<Link>, Vec<Link>) =
                links.into_iter().partition(|link| link.selected);
            self.links = kept;
            for link in removed.iter() {
                self.unlink_endpoints(link);
            }

            let old_removed = self.old_points.remove_selected().len();
            let new_removed = self.new_points.remove_selected().len();
            tracing::info!(
                "Deleted {} links, {old_removed} old and {new_removed} new points",
                removed.len()
            );
        } else {
            self.links.clear();
            self.old_points.clear();
            self.new_points.clear();
            tracing::info!("Deleted all links and points");
        }

        self.update_hulls();
        self.settle();
    }

    /// Renames the single selected link. Returns false if there is none or
    /// `new_name` is empty.
    pub fn rename_selected_link(&mut self, new_name: &str) -> bool {
        if new_name.is_empty() {
            return false;
        }
        let Some(index) = self.single_selected_link_index() else {
            return false;
        };

        let name = self.generate_unique_name(new_name);
        tracing::debug!("Link \"{}\" renamed to \"{name}\"", self.links[index].name);
        self.links[index].name = name;
        true
    }

    /// Scales the linked old points. Unlinked points and hulls are left alone.
    pub fn scale_old_points(&mut self, factor: f64) {
        for link in self.links.iter() {
            if let Some(point) = self.old_points.by_id_mut(&link.old_point) {
                point.scale(factor);
            }
        }
    }

    /// `base`, or `base_1`, `base_2`, ... for the first one no link is named.
    pub fn generate_unique_name(&self, base: &str) -> String {
        if !self.link_name_exists(base) {
            return base.to_string();
        }

        let mut suffix = 1usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.link_name_exists(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    // === Selection ===

    /// Deselects all points, then selects the named link and its endpoints.
    pub fn select_link(&mut self, name: &str) -> Option<&Link> {
        let index = self.links.iter().position(|link| link.name == name)?;

        self.old_points.set_all_selected(false);
        self.new_points.set_all_selected(false);
        self.select_link_at(index, true);
        self.settle();

        self.links.get(index)
    }

    pub fn set_link_selection(&mut self, index: usize, selected: bool) {
        if index >= self.links.len() {
            return;
        }
        self.select_link_at(index, selected);
        self.settle();
    }

    /// Selects exactly the points no link refers to, in both maps.
    pub fn select_unlinked_points(&mut self) {
        let linked = self.linked_ids();
        self.old_points.select_where(|point| !linked.contains(&point.id));
        self.new_points.select_where(|point| !linked.contains(&point.id));
        self.settle();
    }

    fn select_link_at(&mut self, index: usize, selected: bool) {
        let link = &mut self.links[index];
        link.selected = selected;
        let (old_point, new_point) = (link.old_point, link.new_point);
        self.old_points.set_selected(&old_point, selected);
        self.new_points.set_selected(&new_point, selected);
    }

    // === Point Editing ===

    /// Runs `edit` on one collection and settles the changes it made.
    pub fn edit_points<R>(
        &mut self,
        side: MapSide,
        edit: impl FnOnce(&mut PointCollection) -> R,
    ) -> R {
        let result = edit(self.collection_mut(side));
        self.settle();
        result
    }

    pub fn add_point(&mut self, side: MapSide, name: &str, position: DVec2) -> PointId {
        self.edit_points(side, |points| points.add(Point::new(name, position)))
    }

    pub fn set_point_selected(&mut self, side: MapSide, id: &PointId, selected: bool) -> bool {
        self.edit_points(side, |points| points.set_selected(id, selected))
    }

    pub fn set_all_points_selected(&mut self, side: MapSide, selected: bool) {
        self.edit_points(side, |points| points.set_all_selected(selected))
    }

    /// Removes a point. A link that referred to it is dropped.
    pub fn remove_point(&mut self, side: MapSide, id: &PointId) -> Option<Point> {
        self.edit_points(side, |points| points.remove(id))
    }

    // === Queries ===

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn link_for_point(&self, id: &PointId) -> Option<&Link> {
        self.links.iter().find(|link| link.references(*id))
    }

    pub fn search_link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.name == name)
    }

    pub fn search_point(&self, name: &str, side: MapSide) -> Option<&Point> {
        self.points(side).find_by_name(name)
    }

    /// Links with at least one selected endpoint, in link order.
    pub fn selected_links(&self) -> Vec<&Link> {
        self.links
            .iter()
            .filter(|link| self.is_link_selected(link))
            .collect()
    }

    pub fn single_selected_link(&self) -> Option<&Link> {
        self.single_selected_link_index()
            .map(|index| &self.links[index])
    }

    pub fn single_selected_point(&self, side: MapSide) -> Option<&Point> {
        self.points(side).single_selected()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn points(&self, side: MapSide) -> &PointCollection {
        match side {
            MapSide::Old => &self.old_points,
            MapSide::New => &self.new_points,
        }
    }

    pub fn old_points(&self) -> &PointCollection {
        &self.old_points
    }

    pub fn new_points(&self) -> &PointCollection {
        &self.new_points
    }

    pub fn hull(&self, side: MapSide) -> &[DVec2] {
        match side {
            MapSide::Old => &self.old_hull,
            MapSide::New => &self.new_hull,
        }
    }

    pub fn old_hull(&self) -> &[DVec2] {
        &self.old_hull
    }

    pub fn new_hull(&self) -> &[DVec2] {
        &self.new_hull
    }

    pub fn min_links_for_computation(&self) -> usize {
        self.config.min_links_for_computation
    }

    pub fn has_enough_linked_points_for_computation(&self) -> bool {
        self.link_count() >= self.min_links_for_computation()
    }

    /// Endpoint coordinates in link order. New points are passed through
    /// `projector` if one is given.
    pub fn linked_points_copy(
        &self,
        projector: Option<&dyn Projector>,
    ) -> (Vec<DVec2>, Vec<DVec2>) {
        let (old, mut new): (Vec<DVec2>, Vec<DVec2>) = self
            .links
            .iter()
            .filter_map(|link| self.endpoints(link))
            .map(|(old, new)| (old.position, new.position))
            .unzip();

        if let Some(projector) = projector {
            projector.project(&mut new);
        }

        (old, new)
    }

    // === Persistence ===

    pub fn serialize_points(
        &self,
        only_selected: bool,
        compression: Compression,
    ) -> Result<Vec<u8>> {
        codec::encode(&self.snapshot(only_selected), compression)
    }

    /// Merges links and points read from `bytes` into the current state.
    ///
    /// Nothing changes if reading fails. Listeners are informed once.
    pub fn deserialize_points(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot = codec::decode(bytes)?;

        let mut staged = self.clone();
        staged.old_points.suspend_listeners();
        staged.new_points.suspend_listeners();
        staged.merge_snapshot(snapshot)?;
        staged.old_points.activate_listeners();
        staged.new_points.activate_listeners();

        *self = staged;
        self.settle();
        self.validate();

        Ok(())
    }

    pub fn save_to_file(&self, path: &Path, only_selected: bool) -> Result<()> {
        let bytes = self.serialize_points(only_selected, self.config.compression)?;
        std::fs::write(path, bytes)?;
        tracing::info!("Saved {} links to {}", self.link_count(), path.display());
        Ok(())
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.deserialize_points(&bytes)?;
        tracing::info!(
            "Loaded links from {}, {} in total",
            path.display(),
            self.link_count()
        );
        Ok(())
    }

    fn snapshot(&self, only_selected: bool) -> LinkSnapshot {
        let links = self
            .links
            .iter()
            .filter(|link| !only_selected || self.is_link_selected(link))
            .filter_map(|link| {
                let (old, new) = self.endpoints(link)?;
                Some(LinkRecord {
                    name: link.name.clone(),
                    old: old.into(),
                    new: new.into(),
                })
            })
            .collect();

        let linked = self.linked_ids();
        let unlinked = |points: &PointCollection| -> Vec<PointRecord> {
            points
                .iter()
                .filter(|point| !linked.contains(&point.id))
                .filter(|point| !only_selected || point.selected)
                .map(PointRecord::from)
                .collect()
        };

        LinkSnapshot {
            links,
            unlinked_old: unlinked(&self.old_points),
            unlinked_new: unlinked(&self.new_points),
        }
    }

    fn merge_snapshot(&mut self, snapshot: LinkSnapshot) -> Result<()> {
        for record in snapshot.links {
            let name = if record.name.is_empty() {
                self.generate_unique_name("")
            } else {
                record.name
            };
            let old_point = self.old_points.add(record.old.into_point());
            let new_point = self.new_points.add(record.new.into_point());
            self.add_link(old_point, new_point, &name, false)?;
        }

        for record in snapshot.unlinked_old {
            self.old_points.add(record.into_point());
        }
        for record in snapshot.unlinked_new {
            self.new_points.add(record.into_point());
        }

        Ok(())
    }

    // === Report ===

    pub fn format_report(&self, options: &ReportOptions<'_>) -> String {
        let rows: Vec<ReportRow<'_>> = self
            .links
            .iter()
            .filter_map(|link| {
                let (old, new) = self.endpoints(link)?;
                Some(ReportRow {
                    name: &link.name,
                    old: old.position,
                    new: new.position,
                })
            })
            .collect();

        report::format_report(&rows, options)
    }

    // === Change Handling ===

    /// Applies and forwards the changes both collections recorded.
    fn settle(&mut self) {
        let old_changes = self.old_points.take_changes();
        let new_changes = self.new_points.take_changes();
        let mut old_inform = old_changes;
        let mut new_inform = new_changes;

        for (side, changes) in [(MapSide::Old, old_changes), (MapSide::New, new_changes)] {
            if !changes.selection {
                continue;
            }
            self.sync_link_selection(side);
            match side.other() {
                MapSide::Old => old_inform.selection = true,
                MapSide::New => new_inform.selection = true,
            }
        }

        if old_changes.structure || new_changes.structure {
            self.drop_dangling_links();
            self.update_hulls();
        }

        self.old_points.inform_listeners(old_inform);
        self.new_points.inform_listeners(new_inform);
    }

    fn sync_link_selection(&mut self, side: MapSide) {
        let points = match side {
            MapSide::Old => &self.old_points,
            MapSide::New => &self.new_points,
        };
        for link in self.links.iter_mut() {
            link.selected = points
                .by_id(&link.point(side))
                .is_some_and(|point| point.selected);
        }
    }

    fn drop_dangling_links(&mut self) {
        let links = std::mem::take(&mut self.links);
        let (kept, dropped): (Vec<Link>, Vec<Link>) = links.into_iter().partition(|link| {
            self.old_points.contains(&link.old_point) && self.new_points.contains(&link.new_point)
        });
        self.links = kept;

        for link in dropped.iter() {
            tracing::debug!("Link \"{}\" dropped with its point", link.name);
            self.unlink_endpoints(link);
        }
    }

    /// Recomputes both hulls from the linked points.
    pub fn update_hulls(&mut self) {
        let (old, new) = self.linked_points_copy(None);
        self.old_hull = convex_hull(&old);
        self.new_hull = convex_hull(&new);
    }

    // === Helpers ===

    fn collection_mut(&mut self, side: MapSide) -> &mut PointCollection {
        match side {
            MapSide::Old => &mut self.old_points,
            MapSide::New => &mut self.new_points,
        }
    }

    fn set_style(&mut self, side: MapSide, id: &PointId, style: PointStyle) {
        if let Some(point) = self.collection_mut(side).by_id_mut(id) {
            point.style = style;
        }
    }

    fn unlink_endpoints(&mut self, link: &Link) {
        self.set_style(MapSide::Old, &link.old_point, PointStyle::Unlinked);
        self.set_style(MapSide::New, &link.new_point, PointStyle::Unlinked);
    }

    fn endpoints(&self, link: &Link) -> Option<(&Point, &Point)> {
        Some((
            self.old_points.by_id(&link.old_point)?,
            self.new_points.by_id(&link.new_point)?,
        ))
    }

    fn is_link_selected(&self, link: &Link) -> bool {
        self.endpoints(link)
            .is_some_and(|(old, new)| old.selected || new.selected)
    }

    fn single_selected_link_index(&self) -> Option<usize> {
        let mut selected = self
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| self.is_link_selected(link))
            .map(|(index, _)| index);
        let first = selected.next()?;
        match selected.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    fn link_name_exists(&self, name: &str) -> bool {
        self.links.iter().any(|link| link.name == name)
    }

    fn linked_ids(&self) -> HashSet<PointId> {
        self.links
            .iter()
            .flat_map(|link| [link.old_point, link.new_point])
            .collect()
    }

    pub fn validate(&self) {
        if !is_debug() {
            return;
        }

        let mut names = HashSet::new();
        let mut linked = HashSet::new();
        for link in self.links.iter() {
            assert!(
                names.insert(link.name.as_str()),
                "duplicate link name {}",
                link.name
            );
            assert!(linked.insert(link.old_point));
            assert!(linked.insert(link.new_point));

            let (old, new) = self
                .endpoints(link)
                .expect("link endpoints must exist");
            assert_eq!(old.style, PointStyle::Linked);
            assert_eq!(new.style, PointStyle::Linked);
        }

        for point in self.old_points.iter().chain(self.new_points.iter()) {
            if !linked.contains(&point.id) {
                assert_eq!(point.style, PointStyle::Unlinked);
            }
        }
    }
}

impl fmt::Display for LinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = ReportOptions {
            separator: Some(&self.config.report_separator),
            with_header: true,
            ..ReportOptions::default()
        };
        f.write_str(&self.format_report(&options))
    }
}
