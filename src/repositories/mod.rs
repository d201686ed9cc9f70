//! Repository layer for data access operations.
//!
//! Delivery attempts live in memory; retention beyond process lifetime is an
//! external concern.

mod attempt_repo;

pub use attempt_repo::AttemptRepository;

/// Aggregates all repositories for convenient access.
///
/// Cloning is cheap since every repository shares its storage through `Arc`.
#[derive(Clone, Default)]
pub struct Repositories {
    pub attempts: AttemptRepository,
}

impl Repositories {
    pub fn new() -> Self {
        Self {
            attempts: AttemptRepository::new(),
        }
    }
}
