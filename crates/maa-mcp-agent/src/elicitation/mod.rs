//! MCP Elicitation Support
//!
//! When a discovery tool finds more than one device or window, the server
//! asks the human to pick one instead of letting the agent guess. Clients
//! without elicitation support get `selection_required: true` in the tool
//! result, and the server instructions tell the agent to ask the user.

mod helpers;
mod schemas;

#[cfg(test)]
mod tests;

pub use schemas::TargetSelection;

pub use helpers::{selection_message, try_elicit};
