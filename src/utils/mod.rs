//! Data loading and persistence helpers

pub mod data_loader;
pub mod persistence;

pub use data_loader::{dataframe_to_array2, save_predictions, DataLoader};
pub use persistence::{load_object, save_object};
