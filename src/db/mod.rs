//! Database layer (Firestore, with an in-memory stand-in for local runs).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDocs;

/// Collection names as constants.
pub mod collections {
    /// User profiles (keyed by normalized email)
    pub const USERS: &str = "users";
    /// Session rows backing issued credentials
    pub const SESSIONS: &str = "sessions";
    pub const WORKOUTS: &str = "workouts";
    pub const MEALS: &str = "meals";
    pub const PROGRESS: &str = "progress";
    /// User stats aggregates (keyed by owner id)
    pub const USER_STATS: &str = "user_stats";
    /// Singleton settings: `lockdown` and `admins`
    pub const PLATFORM: &str = "platform";
}

/// Document IDs inside the `platform` collection.
pub mod platform_docs {
    pub const LOCKDOWN: &str = "lockdown";
    pub const ADMINS: &str = "admins";
}
