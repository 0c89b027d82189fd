//! Re-creatable output artifacts

pub mod csv_exporter;

pub use csv_exporter::export_update_data;
