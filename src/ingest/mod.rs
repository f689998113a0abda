pub mod dataset;

pub use dataset::{Column, ColumnType, Dataset, Value};
