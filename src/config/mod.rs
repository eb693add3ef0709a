/// Database connection and schema creation
pub mod database;

/// Settings loading from natillera.toml
pub mod settings;
