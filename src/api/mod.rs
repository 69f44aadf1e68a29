pub mod client;
pub mod error;
pub mod supabase;

pub use client::JournalBackend;
pub use error::ApiError;
pub use supabase::SupabaseBackend;
