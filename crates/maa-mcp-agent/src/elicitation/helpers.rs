//! Helper functions for elicitation with graceful fallback

use rmcp::service::{ElicitationSafe, Peer, RoleServer};

/// Elicit structured data from the user, `None` if unsupported or declined
pub async fn try_elicit<T>(peer: &Peer<RoleServer>, message: &str) -> Option<T>
where
    T: ElicitationSafe + serde::de::DeserializeOwned + Send + 'static,
{
    if !peer.supports_elicitation() {
        tracing::debug!(
            "[elicitation] Client does not support elicitation: {}",
            message
        );
        return None;
    }

    match peer.elicit::<T>(message).await {
        Ok(Some(data)) => {
            tracing::info!("[elicitation] User provided data for: {}", message);
            Some(data)
        }
        Ok(None) => {
            tracing::info!("[elicitation] User declined/cancelled: {}", message);
            None
        }
        Err(e) => {
            tracing::warn!("[elicitation] Error calling peer.elicit(): {:?}", e);
            None
        }
    }
}

/// Message shown to the user when a discovery found several targets
pub fn selection_message(kind: &str, candidates: &[String]) -> String {
    let mut message = format!(
        "Several {kind} targets were found. Which one should be automated?\n"
    );
    for (index, candidate) in candidates.iter().enumerate() {
        message.push_str(&format!("{}. {}\n", index + 1, candidate));
    }
    message
}
