pub mod exporter;
pub mod library;
