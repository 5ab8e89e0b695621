use crate::point::{MapSide, PointId};

/// Named correspondence between a point of the old map and a point of the new map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub old_point: PointId,
    pub new_point: PointId,
    pub selected: bool,
}

impl Link {
    pub fn point(&self, side: MapSide) -> PointId {
        match side {
            MapSide::Old => self.old_point,
            MapSide::New => self.new_point,
        }
    }

    pub fn references(&self, point: PointId) -> bool {
        self.old_point == point || self.new_point == point
    }
}
