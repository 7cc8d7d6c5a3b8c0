//! Structured logging configuration.
//!
//! The engine crate logs through the `log` facade; its records are bridged
//! into the tracing subscriber installed here, so one filter governs both.

use durak::{Move, PlayerId, RoomError, db::RoomPin};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use durak_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of a submitted move
///
/// Accepted moves are logged at info, rejections at debug, and anything
/// else (busy, persistence, suspended rooms) through [`log_room_fault`].
/// Called from request handlers, so the line carries the `request_id` of the
/// enclosing request span.
pub fn log_move(pin: &RoomPin, player: PlayerId, mv: &Move, result: Result<usize, &RoomError>) {
    match result {
        Ok(actions) => tracing::info!(
            room = %pin,
            player = player,
            kind = mv.kind(),
            actions = actions,
            "Move accepted"
        ),
        Err(RoomError::Rejected(e)) => tracing::debug!(
            room = %pin,
            player = player,
            kind = mv.kind(),
            reason = e.kind(),
            "Move rejected: {}",
            e
        ),
        Err(e) => log_room_fault(pin, e),
    }
}

/// Log a room-level failure with structured data
pub fn log_room_fault(pin: &RoomPin, error: &RoomError) {
    match error {
        RoomError::Invariant { .. } | RoomError::Unusable { .. } => tracing::error!(
            room = %pin,
            kind = error.kind(),
            "ROOM FAULT: {}",
            error
        ),
        _ if error.is_retryable() => tracing::warn!(
            room = %pin,
            kind = error.kind(),
            retryable = true,
            "Room request failed: {}",
            error
        ),
        _ => tracing::debug!(
            room = %pin,
            kind = error.kind(),
            "Room request failed: {}",
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use durak::{MoveError, game::InvariantViolation};

    fn pin() -> RoomPin {
        RoomPin::parse("123456").unwrap()
    }

    #[test]
    fn test_log_move() {
        // Just ensure it doesn't panic
        log_move(&pin(), 1, &Move::Pass, Ok(1));
        log_move(
            &pin(),
            1,
            &Move::Forfeit,
            Err(&RoomError::Rejected(MoveError::NotYourTurn)),
        );
        log_move(&pin(), 1, &Move::Pass, Err(&RoomError::Busy(pin())));
    }

    #[test]
    fn test_log_room_fault() {
        log_room_fault(
            &pin(),
            &RoomError::Invariant {
                pin: pin(),
                source: InvariantViolation::TableOverflow(7),
            },
        );
        log_room_fault(&pin(), &RoomError::NotFound(pin()));
    }
}
