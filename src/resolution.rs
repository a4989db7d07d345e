use crate::error::ResolveError;
use crate::models::Role;

/// Command sent to the alert store once the caller's role has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveCommand {
    pub alert_id: String,
    pub resolved_by: String,
    pub note: Option<String>,
}

/// Store-side resolution of a persisted alert.
///
/// Implementations must move the alert from pending to resolved atomically:
/// one success per alert id, later attempts fail with `AlreadyResolved`.
/// The store stays the authoritative permission check.
pub trait AlertResolutionGateway {
    /// # Errors
    ///
    /// Returns `ResolveError` when the alert is unknown, already resolved,
    /// or the store rejects the write.
    fn resolve(
        &self,
        command: ResolveCommand,
        caller_role: Role,
    ) -> impl std::future::Future<Output = Result<(), ResolveError>> + Send;
}

/// Role-checked entry point. A caller that may not resolve alerts is
/// rejected before anything reaches the gateway.
pub async fn resolve_alert<G: AlertResolutionGateway>(
    gateway: &G,
    alert_id: &str,
    caller_role: Role,
    resolved_by: &str,
    note: Option<&str>,
) -> Result<(), ResolveError> {
    if !caller_role.can_resolve_alerts() {
        tracing::warn!(alert_id, role = %caller_role, "alert resolution denied");
        return Err(ResolveError::PermissionDenied(caller_role));
    }

    let command = ResolveCommand {
        alert_id: alert_id.to_string(),
        resolved_by: resolved_by.to_string(),
        note: note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string),
    };

    gateway.resolve(command, caller_role).await?;
    tracing::info!(alert_id, role = %caller_role, resolved_by, "alert resolved");
    Ok(())
}
