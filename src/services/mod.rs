/// Messenger publishing outbound messages as server-sent events.
pub mod chat_bridge;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Player-facing texts.
pub mod messages;
/// Outbound chat transport abstraction.
pub mod messenger;
/// Quiz session state machine driver.
pub mod quiz_engine;
/// Command façade over the engine and leaderboard.
pub mod quiz_service;
/// Server-Sent Events streaming service.
pub mod sse_service;
