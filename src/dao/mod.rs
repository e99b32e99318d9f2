/// Leaderboard persistence backends.
pub mod leaderboard_store;
/// Database model definitions.
pub mod models;
/// Question bank loading.
pub mod question_source;
/// Storage abstraction layer errors.
pub mod storage;
