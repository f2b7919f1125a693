pub mod csv_import;
pub mod recommendations;
pub mod stats;
