//! Access policy for files and folders.
//!
//! Rules, in order:
//! 1. The owner may do anything.
//! 2. A recipient may read, never modify.
//! 3. A password-gated target additionally needs the password, or an unlock
//!    token from earlier in the same session, for every read.
//! 4. Everything else is denied.
//!
//! Whether rule 3 applies to owners is a switch on [`AccessPolicy`].

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::password::verify_password;
use super::principal::Principal;
use super::unlock::{TargetRef, UnlockStore};
use crate::file::{Folder, StoredFile};
use crate::{Result, ShareboxError};

/// What the caller wants to do with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read content: download, preview, stream, archive, list a folder.
    Read,
    /// View metadata without content. Not password gated.
    Inspect,
    /// Rename or move.
    Write,
    /// Delete.
    Delete,
    /// Add recipients.
    Share,
    /// Set or clear the access password.
    SetPassword,
}

impl Operation {
    /// Check if recipients may perform this operation.
    pub fn is_read_only(self) -> bool {
        matches!(self, Operation::Read | Operation::Inspect)
    }

    /// Check if this operation passes through the password gate.
    pub fn is_password_gated(self) -> bool {
        self == Operation::Read
    }
}

/// The facts about a target that the policy needs.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Which resource this is.
    pub resource: TargetRef,
    /// Owner user ID.
    pub owner_id: i64,
    /// Whether the principal is among the recipients.
    pub shared_with_principal: bool,
    /// Access password hash, if any.
    pub password_hash: Option<&'a str>,
}

impl<'a> Target<'a> {
    /// Describe a stored file.
    pub fn file(file: &'a StoredFile, shared_with_principal: bool) -> Self {
        Self {
            resource: TargetRef::File(file.id),
            owner_id: file.owner_id,
            shared_with_principal,
            password_hash: file.password_hash.as_deref(),
        }
    }

    /// Describe a folder. Folders have no recipients.
    pub fn folder(folder: &'a Folder) -> Self {
        Self {
            resource: TargetRef::Folder(folder.id),
            owner_id: folder.owner_id,
            shared_with_principal: false,
            password_hash: folder.password_hash.as_deref(),
        }
    }

    fn gate(&self) -> Option<&'a str> {
        self.password_hash.filter(|h| !h.is_empty())
    }
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Neither owner nor (for reads) recipient.
    NotPermitted,
    /// The target is gated and no password or unlock token was presented.
    PasswordRequired,
    /// A password was presented and did not verify.
    PasswordMismatch,
}

impl DenyReason {
    fn message(self) -> &'static str {
        match self {
            DenyReason::NotPermitted => "access denied",
            DenyReason::PasswordRequired => "password required",
            DenyReason::PasswordMismatch => "incorrect password",
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allowed.
    Allow,
    /// Allowed because a freshly presented password verified.
    AllowedByPassword,
    /// Denied.
    Deny(DenyReason),
}

impl Decision {
    /// Check if the decision permits the operation.
    pub fn is_allowed(self) -> bool {
        !matches!(self, Decision::Deny(_))
    }
}

/// Evaluates the access rules and keeps the session unlock tokens.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    unlocks: Arc<UnlockStore>,
    owner_bypasses_password: bool,
}

impl AccessPolicy {
    /// Create a policy.
    pub fn new(unlocks: Arc<UnlockStore>, owner_bypasses_password: bool) -> Self {
        Self {
            unlocks,
            owner_bypasses_password,
        }
    }

    /// The unlock token store.
    pub fn unlocks(&self) -> &Arc<UnlockStore> {
        &self.unlocks
    }

    /// Decide whether `principal` may perform `operation` on `target`.
    ///
    /// `presented` is a password supplied with this request, if any.
    pub fn authorize(
        &self,
        principal: &Principal,
        target: &Target<'_>,
        operation: Operation,
        presented: Option<&str>,
    ) -> Decision {
        let is_owner = target.owner_id == principal.user_id;

        if !is_owner && !(target.shared_with_principal && operation.is_read_only()) {
            return Decision::Deny(DenyReason::NotPermitted);
        }

        if !operation.is_password_gated() || (is_owner && self.owner_bypasses_password) {
            return Decision::Allow;
        }

        let Some(hash) = target.gate() else {
            return Decision::Allow;
        };

        if self
            .unlocks
            .is_unlocked(&principal.session_id, target.resource, Utc::now())
        {
            return Decision::Allow;
        }

        match presented {
            Some(password) if verify_password(password, hash).is_ok() => {
                Decision::AllowedByPassword
            }
            Some(_) => Decision::Deny(DenyReason::PasswordMismatch),
            None => Decision::Deny(DenyReason::PasswordRequired),
        }
    }

    /// Authorize, record an unlock token if a password was just verified,
    /// and turn a denial into `Forbidden`.
    pub fn enforce(
        &self,
        principal: &Principal,
        target: &Target<'_>,
        operation: Operation,
        presented: Option<&str>,
    ) -> Result<()> {
        match self.authorize(principal, target, operation, presented) {
            Decision::Allow => Ok(()),
            Decision::AllowedByPassword => {
                self.record_unlock(principal, target.resource);
                Ok(())
            }
            Decision::Deny(reason) => {
                debug!(
                    user_id = principal.user_id,
                    resource = ?target.resource,
                    ?operation,
                    ?reason,
                    "access denied"
                );
                Err(ShareboxError::Forbidden(reason.message().to_string()))
            }
        }
    }

    /// Verify `password` for `target` and remember the unlock for this session.
    ///
    /// The caller must be allowed to read the target. Targets without a
    /// password unlock trivially. A correct password is checked even if the
    /// session already holds a token.
    pub fn unlock(&self, principal: &Principal, target: &Target<'_>, password: &str) -> Result<()> {
        let is_owner = target.owner_id == principal.user_id;
        if !is_owner && !target.shared_with_principal {
            return Err(ShareboxError::Forbidden(
                DenyReason::NotPermitted.message().to_string(),
            ));
        }

        let Some(hash) = target.gate() else {
            return Ok(());
        };

        if verify_password(password, hash).is_err() {
            return Err(ShareboxError::Forbidden(
                DenyReason::PasswordMismatch.message().to_string(),
            ));
        }

        self.record_unlock(principal, target.resource);
        Ok(())
    }

    /// Forget every session's unlock of `target`, after its password changed.
    pub fn password_changed(&self, target: TargetRef) {
        let revoked = self.unlocks.revoke_target(target);
        if revoked > 0 {
            debug!(resource = ?target, revoked, "revoked unlock tokens");
        }
    }

    fn record_unlock(&self, principal: &Principal, resource: TargetRef) {
        self.unlocks
            .grant(&principal.session_id, resource, principal.session_expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use chrono::Duration;
    use std::sync::OnceLock;

    const OWNER: i64 = 1;
    const RECIPIENT: i64 = 2;
    const STRANGER: i64 = 3;

    fn hashed() -> &'static str {
        static HASH: OnceLock<String> = OnceLock::new();
        HASH.get_or_init(|| hash_password("letmein").unwrap())
    }

    fn principal(user_id: i64, session: &str) -> Principal {
        Principal::new(
            user_id,
            format!("user{user_id}"),
            session,
            Utc::now() + Duration::hours(1),
        )
    }

    fn policy(owner_bypasses_password: bool) -> AccessPolicy {
        AccessPolicy::new(Arc::new(UnlockStore::new()), owner_bypasses_password)
    }

    fn target(user_id: i64, password_hash: Option<&str>) -> Target<'_> {
        Target {
            resource: TargetRef::File(10),
            owner_id: OWNER,
            shared_with_principal: user_id == RECIPIENT,
            password_hash,
        }
    }

    const ALL_OPS: [Operation; 6] = [
        Operation::Read,
        Operation::Inspect,
        Operation::Write,
        Operation::Delete,
        Operation::Share,
        Operation::SetPassword,
    ];

    #[test]
    fn test_owner_may_do_everything() {
        let policy = policy(false);
        let owner = principal(OWNER, "s");
        for op in ALL_OPS {
            assert_eq!(
                policy.authorize(&owner, &target(OWNER, None), op, None),
                Decision::Allow,
                "{op:?}"
            );
        }
    }

    #[test]
    fn test_recipient_reads_but_never_writes() {
        let policy = policy(false);
        let recipient = principal(RECIPIENT, "s");
        let t = target(RECIPIENT, None);

        assert_eq!(policy.authorize(&recipient, &t, Operation::Read, None), Decision::Allow);
        assert_eq!(policy.authorize(&recipient, &t, Operation::Inspect, None), Decision::Allow);
        for op in [
            Operation::Write,
            Operation::Delete,
            Operation::Share,
            Operation::SetPassword,
        ] {
            assert_eq!(
                policy.authorize(&recipient, &t, op, None),
                Decision::Deny(DenyReason::NotPermitted),
                "{op:?}"
            );
        }
    }

    #[test]
    fn test_stranger_denied_everything() {
        let policy = policy(true);
        let stranger = principal(STRANGER, "s");
        for op in ALL_OPS {
            assert_eq!(
                policy.authorize(&stranger, &target(STRANGER, None), op, None),
                Decision::Deny(DenyReason::NotPermitted)
            );
        }
        // A correct password does not help someone with no relationship.
        assert!(!policy
            .authorize(
                &stranger,
                &target(STRANGER, Some(hashed())),
                Operation::Read,
                Some("letmein")
            )
            .is_allowed());
    }

    #[test]
    fn test_password_gate_for_recipient() {
        let policy = policy(false);
        let recipient = principal(RECIPIENT, "s");
        let t = target(RECIPIENT, Some(hashed()));

        assert_eq!(
            policy.authorize(&recipient, &t, Operation::Read, None),
            Decision::Deny(DenyReason::PasswordRequired)
        );
        assert_eq!(
            policy.authorize(&recipient, &t, Operation::Read, Some("nope")),
            Decision::Deny(DenyReason::PasswordMismatch)
        );
        assert_eq!(
            policy.authorize(&recipient, &t, Operation::Read, Some("letmein")),
            Decision::AllowedByPassword
        );
        // Metadata is not gated.
        assert_eq!(
            policy.authorize(&recipient, &t, Operation::Inspect, None),
            Decision::Allow
        );
    }

    #[test]
    fn test_owner_gated_without_bypass() {
        let policy = policy(false);
        let owner = principal(OWNER, "s");
        let t = target(OWNER, Some(hashed()));

        assert_eq!(
            policy.authorize(&owner, &t, Operation::Read, None),
            Decision::Deny(DenyReason::PasswordRequired)
        );
        // Management operations stay open to the owner.
        assert_eq!(
            policy.authorize(&owner, &t, Operation::SetPassword, None),
            Decision::Allow
        );
    }

    #[test]
    fn test_owner_bypass_when_enabled() {
        let policy = policy(true);
        let owner = principal(OWNER, "s");
        let t = target(OWNER, Some(hashed()));

        assert_eq!(policy.authorize(&owner, &t, Operation::Read, None), Decision::Allow);

        // Recipients are still gated.
        let recipient = principal(RECIPIENT, "s");
        assert_eq!(
            policy.authorize(&recipient, &target(RECIPIENT, Some(hashed())), Operation::Read, None),
            Decision::Deny(DenyReason::PasswordRequired)
        );
    }

    #[test]
    fn test_empty_hash_disables_gate() {
        let policy = policy(false);
        let recipient = principal(RECIPIENT, "s");
        assert_eq!(
            policy.authorize(&recipient, &target(RECIPIENT, Some("")), Operation::Read, None),
            Decision::Allow
        );
    }

    #[test]
    fn test_enforce_records_unlock_for_session() {
        let policy = policy(false);
        let recipient = principal(RECIPIENT, "session-a");
        let other_session = principal(RECIPIENT, "session-b");
        let t = target(RECIPIENT, Some(hashed()));

        policy
            .enforce(&recipient, &t, Operation::Read, Some("letmein"))
            .unwrap();
        assert!(policy.enforce(&recipient, &t, Operation::Read, None).is_ok());

        let err = policy
            .enforce(&other_session, &t, Operation::Read, None)
            .unwrap_err();
        assert!(matches!(err, ShareboxError::Forbidden(_)));
    }

    #[test]
    fn test_unlock_and_password_change() {
        let policy = policy(false);
        let recipient = principal(RECIPIENT, "s");
        let t = target(RECIPIENT, Some(hashed()));

        assert!(matches!(
            policy.unlock(&recipient, &t, "wrong"),
            Err(ShareboxError::Forbidden(_))
        ));
        policy.unlock(&recipient, &t, "letmein").unwrap();
        assert_eq!(policy.authorize(&recipient, &t, Operation::Read, None), Decision::Allow);

        policy.password_changed(t.resource);
        assert_eq!(
            policy.authorize(&recipient, &t, Operation::Read, None),
            Decision::Deny(DenyReason::PasswordRequired)
        );
    }

    #[test]
    fn test_unlock_requires_relationship() {
        let policy = policy(false);
        let stranger = principal(STRANGER, "s");
        assert!(policy
            .unlock(&stranger, &target(STRANGER, Some(hashed())), "letmein")
            .is_err());
        assert!(policy.unlocks().is_empty());
    }
}
