mod memory;
mod postgres;
mod sql;
mod sqlite;
mod store_type;

#[cfg(test)]
mod tests_common;

pub use memory::InMemoryCredentialStore;
pub use sql::SqlCredentialStore;
pub use store_type::CredentialStore;
