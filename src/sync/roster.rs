//! Participant resolution against registered accounts.

use tracing::warn;

use crate::backend::MeetingStore;
use crate::model::Participant;

/// Resolve each participant entry by email: a registered account replaces
/// the entry with its full record, everything else passes through
/// unchanged. Input order is preserved, and one bad lookup neither stops
/// the others nor bubbles up — the entry just stays unresolved.
pub async fn resolve_participants(
    store: &dyn MeetingStore,
    participants: &[Participant],
) -> Vec<Participant> {
    let mut resolved = Vec::with_capacity(participants.len());
    for participant in participants {
        match store.registered_user(&participant.email).await {
            Ok(Some(user)) => resolved.push(user.into_participant()),
            Ok(None) => resolved.push(participant.clone()),
            Err(err) => {
                warn!(
                    "Account lookup failed for {}, keeping entry unresolved: {}",
                    participant.email, err
                );
                resolved.push(participant.clone());
            }
        }
    }
    resolved
}
