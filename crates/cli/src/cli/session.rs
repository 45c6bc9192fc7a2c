//! `monkai-trace session`: resolve a user's session id.

use mt_hooks::Telemetry;

/// Resolve (or create) the session for `user` and print its id.
///
/// With `sessions.persistent = true` this goes through the server-side
/// authority, so it shows the id every worker would see.
pub async fn resolve(
    telemetry: &Telemetry,
    user: &str,
    namespace: Option<String>,
    force_new: bool,
) -> anyhow::Result<()> {
    let namespace = namespace.unwrap_or_else(|| telemetry.config().sessions.namespace.clone());
    mt_domain::config::validate_namespace(&namespace)?;

    let sessions = telemetry.sessions();
    let session_id = sessions.resolve_or_create(user, &namespace, force_new).await;
    println!("{session_id}");

    if let Some(info) = sessions.info(user) {
        tracing::debug!(
            session_id = %info.session_id,
            namespace = %info.namespace,
            age_ms = info.age.as_millis() as u64,
            "session details"
        );
    }
    Ok(())
}
