use crate::error::{RegistryError, RegistryResult};

/// Capability token carried by mutating registry calls.
///
/// Write paths check the token rather than the caller's identity: the
/// replication session and administrative tooling both mutate with a
/// privileged token, everything else is read-only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthInfo {
    have_write_access: bool,
}

impl AuthInfo {
    /// A token authorizing mutation.
    pub fn privileged() -> Self {
        Self {
            have_write_access: true,
        }
    }

    /// A token with no write access.
    pub fn read_only() -> Self {
        Self::default()
    }

    pub fn can_write(&self) -> bool {
        self.have_write_access
    }

    /// Fail with [`RegistryError::PermissionDenied`] unless this token can
    /// write.
    pub fn require_write(&self) -> RegistryResult<()> {
        if self.have_write_access {
            Ok(())
        } else {
            Err(RegistryError::PermissionDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_token_can_write() {
        assert!(AuthInfo::privileged().can_write());
        assert!(AuthInfo::privileged().require_write().is_ok());
    }

    #[test]
    fn read_only_token_is_denied() {
        assert!(!AuthInfo::read_only().can_write());
        assert!(matches!(
            AuthInfo::read_only().require_write(),
            Err(RegistryError::PermissionDenied)
        ));
    }
}
