//! Round bookkeeping. Rounds only advance through an explicit "step
//! complete" action; exchanging messages never moves them.

use crate::error::AdvisorError;
use crate::transcript::types::Session;

/// Round tag for the next turn pair.
pub fn active_round(session: &Session) -> u32 {
    (session.current_round + 1).min(session.round_cap)
}

pub fn is_limit_reached(session: &Session) -> bool {
    session.current_round >= session.round_cap
}

/// Close the active round. Returns the round that was closed.
pub fn close_active_round(session: &mut Session) -> Result<u32, AdvisorError> {
    ensure_active(session)?;
    if is_limit_reached(session) {
        return Err(AdvisorError::StateConflict(format!(
            "already at final step ({} of {})",
            session.current_round, session.round_cap
        )));
    }
    session.current_round += 1;
    session.max_reached_round = session.max_reached_round.max(session.current_round);
    Ok(session.current_round)
}

/// Step back to an earlier round. Moving forward is only possible through
/// [`close_active_round`].
pub fn rewind(session: &mut Session, round: u32) -> Result<(), AdvisorError> {
    ensure_active(session)?;
    if round > session.current_round {
        return Err(AdvisorError::Validation(format!(
            "cannot move forward to round {} (currently {}); complete the step instead",
            round, session.current_round
        )));
    }
    session.current_round = round;
    Ok(())
}

pub fn ensure_active(session: &Session) -> Result<(), AdvisorError> {
    if session.is_active() {
        Ok(())
    } else {
        Err(AdvisorError::StateConflict(format!(
            "session {} is {:?}",
            session.id, session.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::types::SessionStatus;
    use chrono::Utc;

    fn session(current_round: u32, round_cap: u32) -> Session {
        Session {
            id: "s".to_string(),
            channel_id: 1,
            round_cap,
            current_round,
            max_reached_round: current_round,
            status: SessionStatus::Active,
            continuation_id: None,
            created_at: Utc::now(),
            last_activity_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_round_saturates_at_cap() {
        assert_eq!(active_round(&session(0, 5)), 1);
        assert_eq!(active_round(&session(4, 5)), 5);
        assert_eq!(active_round(&session(5, 5)), 5);
        assert!(is_limit_reached(&session(5, 5)));
        assert!(!is_limit_reached(&session(4, 5)));
    }

    #[test]
    fn test_close_never_exceeds_cap() {
        let mut s = session(0, 3);
        for expected in 1..=3 {
            assert_eq!(close_active_round(&mut s).unwrap(), expected);
        }
        assert!(matches!(
            close_active_round(&mut s),
            Err(AdvisorError::StateConflict(_))
        ));
        assert_eq!(s.current_round, 3);
        assert!(s.current_round <= s.round_cap);
    }

    #[test]
    fn test_close_rejected_when_not_active() {
        let mut s = session(1, 5);
        s.status = SessionStatus::Cancelled;
        assert!(matches!(
            close_active_round(&mut s),
            Err(AdvisorError::StateConflict(_))
        ));
        assert_eq!(s.current_round, 1);
    }

    #[test]
    fn test_rewind_only_goes_back() {
        let mut s = session(3, 5);
        rewind(&mut s, 1).unwrap();
        assert_eq!(s.current_round, 1);
        assert_eq!(s.max_reached_round, 3);
        assert!(matches!(
            rewind(&mut s, 2),
            Err(AdvisorError::Validation(_))
        ));
    }
}
