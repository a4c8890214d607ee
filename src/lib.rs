pub mod analysis;
pub mod analyst;
pub mod cache;
pub mod categorizer;
pub mod descriptor;
pub mod error;
pub mod fmt;
pub mod importer;
pub mod merger;
pub mod models;
pub mod schema;
pub mod settings;
pub mod taxonomy;
