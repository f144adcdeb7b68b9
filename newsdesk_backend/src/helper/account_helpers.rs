use crate::helper::access_helpers::{self, AccessDenied, Section};
use crate::helper::sanitization_helpers;
use crate::models::db_operations::accounts_db_operations::{self, NewAccount};
use crate::models::db_operations::DbError;
use crate::models::{Account, Page, PageRequest, PermissionSet, Role, VerificationStatus};
use bcrypt::{hash, verify, BcryptError};
use regex::Regex;
use rusqlite::Connection;
use std::sync::OnceLock;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Please provide a valid email address.")]
    InvalidEmail,
    #[error("Display name cannot be empty.")]
    EmptyName,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters long.")]
    WeakPassword,
    #[error("An account with this email already exists.")]
    EmailTaken,
    #[error("Invalid email or password.")]
    InvalidCredentials,
    #[error("Your documents are pending verification. You can log in once an administrator approves them.")]
    PendingVerification,
    #[error("Your verification was rejected. Please contact support.")]
    VerificationRejected,
    #[error("Not logged in.")]
    Unauthenticated,
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    NotAllowed(String),
    #[error("Invalid permissions: {0}")]
    InvalidPermissions(String),
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Password hashing error: {0}")]
    Hash(#[from] BcryptError),
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(AccountError::InvalidEmail);
    }
    Ok(email)
}

fn validate_new_account(
    conn: &Connection,
    email: &str,
    display_name: &str,
    password: &str,
) -> Result<(String, String), AccountError> {
    let email = normalize_email(email)?;
    let display_name = sanitization_helpers::strip_all_html(display_name.trim());
    if display_name.is_empty() {
        return Err(AccountError::EmptyName);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    if accounts_db_operations::email_exists(conn, &email)? {
        return Err(AccountError::EmailTaken);
    }
    Ok((email, display_name))
}

/// Public sign-up. Always creates an unverified reporter.
pub fn sign_up(
    conn: &Connection,
    email: &str,
    display_name: &str,
    password: &str,
    hash_cost: u32,
) -> Result<Account, AccountError> {
    let (email, display_name) = validate_new_account(conn, email, display_name, password)?;
    let password_hash = hash(password, hash_cost)?;
    let account = accounts_db_operations::insert_account(
        conn,
        &NewAccount {
            email: &email,
            display_name: &display_name,
            password_hash: &password_hash,
            role: Role::Reporter,
            permissions: access_helpers::default_reporter_permissions(),
            documents_verified: false,
            verification_status: VerificationStatus::Pending,
        },
    )?;
    log::info!("Reporter {} signed up, awaiting verification", account.id);
    Ok(account)
}

/// Creates a verified admin with the default admin permission set.
pub fn create_admin(
    conn: &Connection,
    actor: &Account,
    email: &str,
    display_name: &str,
    password: &str,
    hash_cost: u32,
) -> Result<Account, AccountError> {
    access_helpers::require_section(actor, Section::Team)?;
    let (email, display_name) = validate_new_account(conn, email, display_name, password)?;
    let password_hash = hash(password, hash_cost)?;
    let account = accounts_db_operations::insert_account(
        conn,
        &NewAccount {
            email: &email,
            display_name: &display_name,
            password_hash: &password_hash,
            role: Role::Admin,
            permissions: access_helpers::default_admin_permissions(),
            documents_verified: true,
            verification_status: VerificationStatus::Approved,
        },
    )?;
    log::info!("Admin {} created by {}", account.id, actor.id);
    Ok(account)
}

/// Bootstrap path used by the setup CLI; no actor is involved.
pub fn create_superadmin(
    conn: &Connection,
    email: &str,
    display_name: &str,
    password: &str,
    hash_cost: u32,
) -> Result<Account, AccountError> {
    let (email, display_name) = validate_new_account(conn, email, display_name, password)?;
    let password_hash = hash(password, hash_cost)?;
    Ok(accounts_db_operations::insert_account(
        conn,
        &NewAccount {
            email: &email,
            display_name: &display_name,
            password_hash: &password_hash,
            role: Role::Superadmin,
            permissions: Section::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            documents_verified: true,
            verification_status: VerificationStatus::Approved,
        },
    )?)
}

/// A reporter whose documents are not verified never gets a session.
fn verification_gate(account: &Account) -> Result<(), AccountError> {
    if account.role != Role::Reporter || account.documents_verified {
        return Ok(());
    }
    match account.verification_status {
        VerificationStatus::Rejected => Err(AccountError::VerificationRejected),
        _ => Err(AccountError::PendingVerification),
    }
}

/// Checks credentials, then the verification gate. Callers must drop any
/// session on `PendingVerification`/`VerificationRejected`.
pub fn log_in(conn: &Connection, email: &str, password: &str) -> Result<Account, AccountError> {
    let email = email.trim().to_lowercase();
    let (account, password_hash) = match accounts_db_operations::read_credentials(conn, &email)? {
        Some(found) => found,
        None => return Err(AccountError::InvalidCredentials),
    };
    if !verify(password, &password_hash).unwrap_or(false) {
        return Err(AccountError::InvalidCredentials);
    }
    if let Err(gate) = verification_gate(&account) {
        log::warn!("Login refused for {}: {}", account.id, gate);
        return Err(gate);
    }
    log::info!("Account {} ({}) logged in", account.id, account.role);
    Ok(account)
}

/// Re-reads the session's account so role and permissions are always current.
pub fn load_session_account(conn: &Connection, account_id: Option<&str>) -> Result<Account, AccountError> {
    let account_id = account_id.ok_or(AccountError::Unauthenticated)?;
    let account = accounts_db_operations::read_account(conn, account_id)?
        .ok_or(AccountError::Unauthenticated)?;
    verification_gate(&account)?;
    Ok(account)
}

/// Approves or rejects a reporter's documents.
pub fn set_verification(
    conn: &Connection,
    actor: &Account,
    account_id: &str,
    decision: VerificationStatus,
) -> Result<Account, AccountError> {
    access_helpers::require_section(actor, Section::Users)?;
    let target = accounts_db_operations::read_account(conn, account_id)?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))?;
    if target.role != Role::Reporter {
        return Err(AccountError::NotAllowed("Only reporter accounts go through verification.".to_string()));
    }
    let verified = match decision {
        VerificationStatus::Approved => true,
        VerificationStatus::Rejected => false,
        VerificationStatus::Pending => {
            return Err(AccountError::NotAllowed("A verification decision must be approved or rejected.".to_string()))
        }
    };
    accounts_db_operations::update_verification(conn, account_id, verified, decision)?;
    log::info!("Reporter {} verification set to {} by {}", account_id, decision, actor.id);
    accounts_db_operations::read_account(conn, account_id)?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
}

/// Replaces an account's permission set.
///
/// Superadmin accounts are not editable, nobody edits their own set, and a
/// non-superadmin actor cannot grant a section it does not hold itself.
pub fn update_permissions(
    conn: &Connection,
    actor: &Account,
    account_id: &str,
    requested: &[String],
) -> Result<Account, AccountError> {
    access_helpers::require_section(actor, Section::Acl)?;
    let permissions: PermissionSet =
        access_helpers::validate_permissions(requested).map_err(AccountError::InvalidPermissions)?;

    let target = accounts_db_operations::read_account(conn, account_id)?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))?;
    if target.role == Role::Superadmin {
        return Err(AccountError::NotAllowed("Superadmin permissions cannot be edited.".to_string()));
    }
    if target.id == actor.id {
        return Err(AccountError::NotAllowed("You cannot edit your own permissions.".to_string()));
    }
    if actor.role != Role::Superadmin {
        if let Some(extra) = permissions.iter().find(|p| !actor.permissions.contains(*p)) {
            return Err(AccountError::NotAllowed(format!("You cannot grant '{}' without holding it.", extra)));
        }
    }

    accounts_db_operations::update_permissions(conn, account_id, &permissions)?;
    log::info!("Permissions of {} set to {:?} by {}", account_id, permissions, actor.id);
    accounts_db_operations::read_account(conn, account_id)?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
}

/// Lists reporters (needs `users`) and/or admin-tier accounts (needs `team`).
pub fn list_accounts(
    conn: &Connection,
    actor: &Account,
    role: Option<Role>,
    page: PageRequest,
) -> Result<Page<Account>, AccountError> {
    let sees_users = access_helpers::can_access(actor.role, &actor.permissions, Section::Users);
    let sees_team = access_helpers::can_access(actor.role, &actor.permissions, Section::Team);

    let roles: Vec<Role> = match role {
        Some(Role::Reporter) => {
            access_helpers::require_section(actor, Section::Users)?;
            vec![Role::Reporter]
        }
        Some(other) => {
            access_helpers::require_section(actor, Section::Team)?;
            vec![other]
        }
        None => {
            let mut roles = Vec::new();
            if sees_users {
                roles.push(Role::Reporter);
            }
            if sees_team {
                roles.extend([Role::Admin, Role::Superadmin]);
            }
            if roles.is_empty() {
                return Err(AccessDenied { section: Section::Users }.into());
            }
            roles
        }
    };
    let (data, count) = accounts_db_operations::list_accounts(conn, &roles, page)?;
    Ok(Page { data, count })
}

pub fn delete_account(conn: &Connection, actor: &Account, account_id: &str) -> Result<Account, AccountError> {
    let target = accounts_db_operations::read_account(conn, account_id)?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))?;
    match target.role {
        Role::Superadmin => {
            return Err(AccountError::NotAllowed("Superadmin accounts cannot be deleted.".to_string()))
        }
        Role::Admin => access_helpers::require_section(actor, Section::Team)?,
        Role::Reporter => access_helpers::require_section(actor, Section::Users)?,
    }
    if target.id == actor.id {
        return Err(AccountError::NotAllowed("You cannot delete your own account.".to_string()));
    }
    accounts_db_operations::delete_account(conn, account_id)?;
    log::info!("Account {} ({}) deleted by {}", account_id, target.role, actor.id);
    Ok(target)
}

pub fn change_password(conn: &Connection, email: &str, new_password: &str, hash_cost: u32) -> Result<(), AccountError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    let email = normalize_email(email)?;
    let password_hash = hash(new_password, hash_cost)?;
    if accounts_db_operations::update_password_hash(conn, &email, &password_hash)? == 0 {
        return Err(AccountError::NotFound(email));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::test_support::account;
    use crate::setup::db_setup::test_connection;

    const COST: u32 = 4;

    #[test]
    fn sign_up_creates_unverified_reporter_with_panel() {
        let conn = test_connection();
        let created = sign_up(&conn, " Ana@Desk.Test ", "Ana", "correct horse", COST).unwrap();
        assert_eq!(created.email, "ana@desk.test");
        assert_eq!(created.role, Role::Reporter);
        assert!(!created.documents_verified);
        assert_eq!(created.verification_status, VerificationStatus::Pending);
        assert!(created.permissions.contains("my-panel"));

        assert!(matches!(sign_up(&conn, "ana@desk.test", "Ana", "correct horse", COST), Err(AccountError::EmailTaken)));
        assert!(matches!(sign_up(&conn, "not-an-email", "Ana", "correct horse", COST), Err(AccountError::InvalidEmail)));
        assert!(matches!(sign_up(&conn, "b@desk.test", "B", "short", COST), Err(AccountError::WeakPassword)));
    }

    #[test]
    fn unverified_reporter_passes_credentials_but_is_refused() {
        let conn = test_connection();
        sign_up(&conn, "ana@desk.test", "Ana", "correct horse", COST).unwrap();

        assert!(matches!(log_in(&conn, "ana@desk.test", "wrong password"), Err(AccountError::InvalidCredentials)));
        assert!(matches!(log_in(&conn, "ana@desk.test", "correct horse"), Err(AccountError::PendingVerification)));
    }

    #[test]
    fn verification_decides_whether_login_succeeds() {
        let conn = test_connection();
        let superadmin = account(&conn, Role::Superadmin, &[]);
        let reporter = sign_up(&conn, "ana@desk.test", "Ana", "correct horse", COST).unwrap();

        set_verification(&conn, &superadmin, &reporter.id, VerificationStatus::Rejected).unwrap();
        assert!(matches!(log_in(&conn, "ana@desk.test", "correct horse"), Err(AccountError::VerificationRejected)));

        set_verification(&conn, &superadmin, &reporter.id, VerificationStatus::Approved).unwrap();
        let logged_in = log_in(&conn, "ana@desk.test", "correct horse").unwrap();
        assert_eq!(logged_in.id, reporter.id);
        assert!(load_session_account(&conn, Some(&reporter.id)).is_ok());
    }

    #[test]
    fn session_account_is_reread_each_time() {
        let conn = test_connection();
        let superadmin = account(&conn, Role::Superadmin, &[]);
        let admin = account(&conn, Role::Admin, &["news"]);

        update_permissions(&conn, &superadmin, &admin.id, &["approval".to_string()]).unwrap();
        let reloaded = load_session_account(&conn, Some(&admin.id)).unwrap();
        assert!(reloaded.permissions.contains("approval"));
        assert!(!reloaded.permissions.contains("news"));

        accounts_db_operations::delete_account(&conn, &admin.id).unwrap();
        assert!(matches!(load_session_account(&conn, Some(&admin.id)), Err(AccountError::Unauthenticated)));
        assert!(matches!(load_session_account(&conn, None), Err(AccountError::Unauthenticated)));
    }

    #[test]
    fn permission_edits_cannot_escalate() {
        let conn = test_connection();
        let acl_admin = account(&conn, Role::Admin, &["acl", "news"]);
        let other = account(&conn, Role::Admin, &[]);
        let superadmin = account(&conn, Role::Superadmin, &[]);

        assert!(update_permissions(&conn, &acl_admin, &other.id, &["news".to_string()]).is_ok());
        assert!(matches!(
            update_permissions(&conn, &acl_admin, &other.id, &["team".to_string()]),
            Err(AccountError::NotAllowed(_))
        ));
        assert!(matches!(
            update_permissions(&conn, &acl_admin, &acl_admin.id, &["news".to_string()]),
            Err(AccountError::NotAllowed(_))
        ));
        assert!(matches!(
            update_permissions(&conn, &acl_admin, &superadmin.id, &[]),
            Err(AccountError::NotAllowed(_))
        ));
        assert!(matches!(
            update_permissions(&conn, &superadmin, &other.id, &["root".to_string()]),
            Err(AccountError::InvalidPermissions(_))
        ));
    }

    #[test]
    fn admins_are_created_verified_with_defaults() {
        let conn = test_connection();
        let superadmin = account(&conn, Role::Superadmin, &[]);
        let admin = create_admin(&conn, &superadmin, "ed@desk.test", "Ed", "long enough", COST).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.documents_verified);
        assert_eq!(admin.permissions, access_helpers::default_admin_permissions());
        assert!(log_in(&conn, "ed@desk.test", "long enough").is_ok());
    }

    #[test]
    fn deletion_rules_follow_target_role() {
        let conn = test_connection();
        let users_admin = account(&conn, Role::Admin, &["users"]);
        let reporter = account(&conn, Role::Reporter, &["my-panel"]);
        let admin = account(&conn, Role::Admin, &[]);
        let superadmin = account(&conn, Role::Superadmin, &[]);

        assert!(matches!(delete_account(&conn, &users_admin, &admin.id), Err(AccountError::Access(_))));
        assert!(matches!(delete_account(&conn, &superadmin, &superadmin.id), Err(AccountError::NotAllowed(_))));
        delete_account(&conn, &users_admin, &reporter.id).unwrap();
        delete_account(&conn, &superadmin, &admin.id).unwrap();
    }

    #[test]
    fn listing_respects_users_and_team_sections() {
        let conn = test_connection();
        let users_admin = account(&conn, Role::Admin, &["users"]);
        account(&conn, Role::Reporter, &["my-panel"]);

        let page = list_accounts(&conn, &users_admin, None, PageRequest::default()).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].role, Role::Reporter);
        assert!(matches!(
            list_accounts(&conn, &users_admin, Some(Role::Admin), PageRequest::default()),
            Err(AccountError::Access(_))
        ));
    }
}
