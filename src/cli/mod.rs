pub mod chat;
pub mod consolidate;
pub mod doctor;
pub mod keys;
pub mod reindex;
pub mod stats;
