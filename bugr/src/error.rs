//! Process exit codes

use bugtriage::prelude::TriageError;

/// Generic failure
pub const EXIT_FAILURE: i32 = 1;

/// Login required: no session, an expired session, or rejected credentials
pub const EXIT_LOGIN_REQUIRED: i32 = 2;

pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TriageError>() {
        Some(err) if err.is_unauthenticated() => EXIT_LOGIN_REQUIRED,
        Some(TriageError::Auth { .. }) => EXIT_LOGIN_REQUIRED,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_errors_exit_2() {
        assert_eq!(exit_code(&TriageError::NoSession.into()), EXIT_LOGIN_REQUIRED);
        assert_eq!(exit_code(&TriageError::Unauthorized.into()), EXIT_LOGIN_REQUIRED);
        assert_eq!(
            exit_code(
                &TriageError::Auth {
                    message: "Invalid credentials".into()
                }
                .into()
            ),
            EXIT_LOGIN_REQUIRED
        );
        assert_eq!(exit_code(&anyhow::anyhow!("disk full")), EXIT_FAILURE);
    }
}
