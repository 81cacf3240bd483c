//! Collaborator clients
//!
//! The core treats the AI classifier, the assist-match service, and the chat
//! gateway as external collaborators behind trait seams. Each HTTP client
//! carries a bounded request timeout and degrades to its documented fallback
//! on error; none of them is ever allowed to hang the poller or a request.

pub mod assist;
pub mod classifier;
pub mod gateway;

pub use assist::{AssistCandidate, AssistMatcher, HttpAssistMatcher};
pub use classifier::{Analysis, Classifier, Confidence, HttpClassifier};
pub use gateway::{ChatGateway, HttpChatGateway};
