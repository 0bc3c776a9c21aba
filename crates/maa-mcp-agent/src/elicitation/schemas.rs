//! Elicitation schemas for structured user input

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use rmcp::elicit_safe;

/// The user's pick among several discovered devices or windows
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Choose which target to automate")]
pub struct TargetSelection {
    /// Exact name of the chosen device or window
    #[schemars(description = "Name of the device or window to use, exactly as listed")]
    pub name: String,
}

elicit_safe!(TargetSelection);
