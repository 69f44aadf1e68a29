pub mod connection;
pub mod local_backend;
pub mod migration_runner;

pub use connection::Database;
pub use local_backend::LocalBackend;
pub use migration_runner::MigrationRunner;
