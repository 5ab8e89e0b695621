use std::fmt;

use common::id_type;
use common::key_index_vec::KeyIndexKey;
use common::FloatExt;
use glam::DVec2;
use serde::{Deserialize, Serialize};

id_type!(PointId);

/// Which of the two maps a point or collection belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapSide {
    Old,
    New,
}

impl MapSide {
    pub fn other(self) -> MapSide {
        match self {
            MapSide::Old => MapSide::New,
            MapSide::New => MapSide::Old,
        }
    }

    pub fn collection_name(self) -> &'static str {
        match self {
            MapSide::Old => "old points",
            MapSide::New => "new points",
        }
    }
}

impl fmt::Display for MapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// Display tag handed to the renderer. The core only switches it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointStyle {
    #[default]
    Unlinked,
    Linked,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: PointId,
    /// Empty for unnamed points.
    pub name: String,
    pub position: DVec2,
    pub selected: bool,
    pub style: PointStyle,
}

impl Point {
    pub fn new(name: impl Into<String>, position: DVec2) -> Self {
        Point {
            id: PointId::unique(),
            name: name.into(),
            position,
            selected: false,
            style: PointStyle::Unlinked,
        }
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Both axes differ by strictly less than `tolerance`.
    pub fn is_close(&self, other: &Point, tolerance: f64) -> bool {
        self.position.x.close_to(other.position.x, tolerance)
            && self.position.y.close_to(other.position.y, tolerance)
    }

    pub fn scale(&mut self, factor: f64) {
        self.position *= factor;
    }
}

impl KeyIndexKey<PointId> for Point {
    fn key(&self) -> &PointId {
        &self.id
    }
}
