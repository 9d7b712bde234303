use crate::error::{Error, Result};
use crate::model::UserIdentity;

/// Proof that the gate has passed for the current request.
///
/// Store-reaching operations take one of these, so they cannot be invoked before the gate.
#[derive(Debug, Clone, Copy)]
pub struct Access<'a> {
    user: &'a UserIdentity,
}

impl<'a> Access<'a> {
    pub fn user(&self) -> &'a UserIdentity {
        self.user
    }
}

/// Two-state gate: a request is either unauthenticated (`None`) or carries the identity
/// of a validated session. The gate keeps no state of its own between calls.
pub struct AccessGate;

impl AccessGate {
    /// Synchronous precondition for every user-facing store access.
    ///
    /// Denial happens here, before any query, so unauthenticated callers learn nothing
    /// about what exists.
    pub fn check(session: Option<&UserIdentity>) -> Result<Access<'_>> {
        match session {
            Some(user) => Ok(Access { user }),
            None => {
                log::debug!("access gate denied a request without a valid session");
                Err(Error::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_denies_missing_session() {
        assert!(matches!(AccessGate::check(None), Err(Error::Unauthenticated)));
    }

    #[test]
    fn test_gate_passes_identity_through() {
        let identity = UserIdentity::new(12);
        let access = AccessGate::check(Some(&identity)).unwrap();
        assert_eq!(access.user().user_id, 12);
    }
}
