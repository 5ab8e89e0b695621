#[macro_use]
pub mod macros;
pub mod file_format;
pub mod file_utils;
pub mod float_ext;
pub mod key_index_vec;
pub mod log_setup;
pub mod serde;
pub mod test_utils;

pub use file_format::{FileExtensionError, SerdeFormat};
pub use float_ext::FloatExt;
pub use crate::serde::{deserialize, serialize, Result};

/// Per-axis tolerance below which two coordinates are considered identical.
pub const EPSILON: f64 = 1e-6;

pub fn is_debug() -> bool {
    cfg!(debug_assertions)
}
