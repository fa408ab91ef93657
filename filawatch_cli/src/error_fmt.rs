//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and
/// fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use filawatch_core::error::{BuildError, WatchError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No GPIO transport was provided to the watchdog engine.\nLikely causes: The bridge failed to initialize or was not wired into the builder.\nHow to fix: Ensure the bridge is created successfully and passed via with_transport(...).".to_string()
            }
            BuildError::MissingPrinter => {
                "What happened: No printer control was provided to the watchdog engine.\nLikely causes: The host adapter failed to initialize or was not wired into the builder.\nHow to fix: Ensure the print-control collaborator is passed via with_printer(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/filawatch.toml for a sample."
            ),
        };
    }

    if let Some(we) = err.downcast_ref::<WatchError>() {
        return match we {
            WatchError::Timeout => {
                "What happened: The GPIO bridge did not answer within the configured timeout.\nLikely causes: Bridge unplugged, wrong wiring, or transport.read_timeout_ms too low.\nHow to fix: Check the USB bridge and wiring, or raise transport.read_timeout_ms in the config.".to_string()
            }
            WatchError::Transport(msg) => format!(
                "What happened: GPIO transport failure ({msg}).\nLikely causes: Bridge disconnected mid-read or a channel is not configured.\nHow to fix: Check cabling and the [transport] section; the watch loop recovers on its own, one-shot commands do not."
            ),
            WatchError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range pins or zero intervals in the TOML.\nHow to fix: Edit the config file and rerun."
            ),
            WatchError::State(msg) => format!(
                "What happened: Internal state error ({msg}).\nLikely causes: A previous panic poisoned the engine.\nHow to fix: Restart the process; re-run with --log-level=debug for detail."
            ),
        };
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    let msg = err.to_string();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map typed errors to stable exit codes; generic errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use filawatch_core::error::{BuildError, WatchError};
    if let Some(we) = err.downcast_ref::<WatchError>() {
        return match we {
            WatchError::Transport(_) => 2,
            WatchError::Timeout => 3,
            WatchError::Config(_) => 4,
            WatchError::State(_) => 5,
        };
    }
    if matches!(err.downcast_ref::<BuildError>(), Some(BuildError::InvalidConfig(_))) {
        return 4;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use filawatch_core::error::WatchError;
    use serde_json::json;

    let reason = match err.downcast_ref::<WatchError>() {
        Some(WatchError::Transport(_)) => "Transport",
        Some(WatchError::Timeout) => "Timeout",
        Some(WatchError::Config(_)) => "Config",
        Some(WatchError::State(_)) => "State",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
