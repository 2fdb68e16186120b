// src/preprocessing/mod.rs
pub mod encoding;
pub mod normalize;
pub mod scaling;

pub use encoding::{EncodingTable, EncodingTables, Resolution};
pub use normalize::{normalize, CanonicalRow, CellValue, NumericDefault};
pub use scaling::{ColumnScale, ScalingParameters};
