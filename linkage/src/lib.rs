//! Correspondence points between an old map and a new map.
//!
//! The [`LinkManager`] owns one [`PointCollection`] per map and the list of
//! [`Link`]s pairing their points. It keeps link names unique, rejects links
//! on duplicate coordinates, keeps link and point selection in sync and
//! maintains a convex hull around the linked points of each map. Links and
//! unlinked points persist through the binary format in [`codec`].

pub mod codec;
pub mod config;
pub mod convex_hull;
pub mod error;
pub mod link;
pub mod link_manager;
pub mod point;
pub mod point_collection;
pub mod report;

pub use codec::Compression;
pub use config::LinkConfig;
pub use error::{Error, Result};
pub use link::Link;
pub use link_manager::LinkManager;
pub use point::{MapSide, Point, PointId, PointStyle};
pub use point_collection::{PointCollection, PointSetListener};
pub use report::{PixelReference, Projector, ReportOptions, Transformation};
