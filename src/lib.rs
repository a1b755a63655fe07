//! NovelForge Engine — the asynchronous generation pipeline and state
//! machines behind a choice-driven interactive-fiction platform: the Task
//! Dispatcher, Generator Worker, Notification Consumer, Scene Cache, and
//! Stuck-Task Reaper (SPEC_FULL §0). HTTP/WebSocket/auth surfaces are
//! external collaborators and are not part of this crate.

pub mod application;
pub mod domain;
pub mod infrastructure;
