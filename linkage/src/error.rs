use thiserror::Error;

use crate::point::{MapSide, PointId};

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "A linked point with same coordinates already exists. \
         The name of the conflicting link is \"{conflicting_link}\""
    )]
    DuplicateCoordinate { conflicting_link: String },
    #[error("Point {id} is not part of the {side} collection")]
    UnknownPoint { id: PointId, side: MapSide },
    #[error("Malformed link stream: {0}")]
    MalformedStream(String),
    #[error("Name of {0} bytes does not fit a link record")]
    StringTooLong(usize),
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
