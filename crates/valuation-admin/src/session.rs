use serde::Serialize;

use crate::{AdminError, AdminSecret};

/// Where an admin is in the edit cycle.
///
/// `LoggedOut` → `AwaitingBackup` on a correct password, → `ReadyToEdit` once a
/// backup has been exported, and back to `LoggedOut` on logout or after a
/// formula save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    #[default]
    LoggedOut,
    AwaitingBackup,
    ReadyToEdit,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStatus {
    pub state: AdminState,
    pub authenticated: bool,
    pub backup_confirmed: bool,
    pub login_failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AdminSession {
    state: AdminState,
    login_failed: bool,
}

impl AdminSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdminState {
        self.state
    }

    pub fn authenticated(&self) -> bool {
        self.state != AdminState::LoggedOut
    }

    pub fn backup_confirmed(&self) -> bool {
        self.state == AdminState::ReadyToEdit
    }

    pub fn login_failed(&self) -> bool {
        self.login_failed
    }

    pub fn status(&self) -> AdminStatus {
        AdminStatus {
            state: self.state,
            authenticated: self.authenticated(),
            backup_confirmed: self.backup_confirmed(),
            login_failed: self.login_failed,
        }
    }

    /// Check a password attempt. `secret` is `None` when no admin password is
    /// configured, which disables admin mode entirely.
    pub fn login(&mut self, attempt: &str, secret: Option<&AdminSecret>) -> Result<(), AdminError> {
        let secret = secret.ok_or(AdminError::Disabled)?;
        if !secret.matches(attempt) {
            self.login_failed = true;
            tracing::warn!("Admin login failed");
            return Err(AdminError::InvalidPassword);
        }

        self.login_failed = false;
        if self.state == AdminState::LoggedOut {
            self.state = AdminState::AwaitingBackup;
            tracing::info!("Admin logged in, awaiting backup");
        }
        Ok(())
    }

    pub fn logout(&mut self) {
        self.state = AdminState::LoggedOut;
        self.login_failed = false;
    }

    /// Record that the current definitions were exported.
    pub fn confirm_backup(&mut self) -> Result<(), AdminError> {
        self.require_authenticated()?;
        if self.state == AdminState::AwaitingBackup {
            self.state = AdminState::ReadyToEdit;
            tracing::info!("Backup exported, editing unlocked");
        }
        Ok(())
    }

    pub fn require_authenticated(&self) -> Result<(), AdminError> {
        if self.authenticated() {
            Ok(())
        } else {
            Err(AdminError::NotAuthenticated)
        }
    }

    pub fn require_ready(&self) -> Result<(), AdminError> {
        match self.state {
            AdminState::ReadyToEdit => Ok(()),
            AdminState::AwaitingBackup => Err(AdminError::BackupRequired),
            AdminState::LoggedOut => Err(AdminError::NotAuthenticated),
        }
    }

    /// End the edit episode after a save: both a new login and a new backup
    /// are needed before the next edit.
    pub fn finish_episode(&mut self) {
        self.logout();
        tracing::info!("Formula changes saved, admin session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> AdminSecret {
        AdminSecret::new("hunter2")
    }

    #[test]
    fn test_full_cycle() {
        let mut session = AdminSession::new();
        assert_eq!(session.state(), AdminState::LoggedOut);
        assert_eq!(session.require_ready(), Err(AdminError::NotAuthenticated));

        session.login("hunter2", Some(&secret())).unwrap();
        assert_eq!(session.state(), AdminState::AwaitingBackup);
        assert!(session.authenticated());
        assert!(!session.backup_confirmed());
        assert_eq!(session.require_ready(), Err(AdminError::BackupRequired));

        session.confirm_backup().unwrap();
        assert_eq!(session.state(), AdminState::ReadyToEdit);
        assert!(session.require_ready().is_ok());

        session.finish_episode();
        assert_eq!(session.state(), AdminState::LoggedOut);
        assert!(!session.authenticated());
        assert!(!session.backup_confirmed());
    }

    #[test]
    fn test_wrong_password_sets_flag() {
        let mut session = AdminSession::new();
        assert_eq!(
            session.login("nope", Some(&secret())),
            Err(AdminError::InvalidPassword)
        );
        assert_eq!(session.state(), AdminState::LoggedOut);
        assert!(session.login_failed());

        session.login("hunter2", Some(&secret())).unwrap();
        assert!(!session.login_failed());
    }

    #[test]
    fn test_disabled_without_secret() {
        let mut session = AdminSession::new();
        assert_eq!(session.login("anything", None), Err(AdminError::Disabled));
        assert!(!session.authenticated());
    }

    #[test]
    fn test_backup_requires_login() {
        let mut session = AdminSession::new();
        assert_eq!(session.confirm_backup(), Err(AdminError::NotAuthenticated));
        assert_eq!(session.state(), AdminState::LoggedOut);
    }

    #[test]
    fn test_relogin_keeps_unlocked_state() {
        let mut session = AdminSession::new();
        session.login("hunter2", Some(&secret())).unwrap();
        session.confirm_backup().unwrap();
        session.login("hunter2", Some(&secret())).unwrap();
        assert_eq!(session.state(), AdminState::ReadyToEdit);
    }
}
