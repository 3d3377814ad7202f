//! Login, self-service signup, invitation-gated admin signup, and
//! invitation issuance.

use chrono::Utc;
use timetable_core::types::{Account, DbId, NewAccount, Role};
use timetable_core::{TimetableError, TimetableResult};
use timetable_platform::invitations::{generate_invitation, hash_token};
use timetable_platform::password::{hash_password, verify_against_dummy, verify_password};
use timetable_platform::{AuditAction, SessionManager};
use tracing::{info, warn};

use crate::catalog::resolve_scope;
use crate::models::{present, secret, AdminSignupRequest, AuthResponse, InvitationResponse, LoginRequest, SignupRequest};
use crate::store::TimetableStore;

pub const FACULTY_MAX_LOAD: i32 = 20;
pub const ADMIN_MAX_LOAD: i32 = 0;

pub async fn login(
    store: &dyn TimetableStore,
    sessions: &SessionManager,
    req: LoginRequest,
) -> TimetableResult<AuthResponse> {
    let (Some(email), Some(password)) = (present(&req.email), secret(&req.password)) else {
        return Err(TimetableError::validation("Email and password are required"));
    };

    let account = match store.find_account_by_email(email).await? {
        Some(account) => account,
        None => {
            verify_against_dummy(password);
            metrics::counter!("auth.login.failed").increment(1);
            return Err(TimetableError::InvalidCredentials);
        }
    };

    if !verify_password(password, &account.password_hash)? {
        metrics::counter!("auth.login.failed").increment(1);
        return Err(TimetableError::InvalidCredentials);
    }

    let token = sessions.issue(account.id, &account.email, account.role)?;
    store
        .append_audit(Some(account.id), &AuditAction::Login.to_string())
        .await?;

    metrics::counter!("auth.login.succeeded").increment(1);
    info!(account_id = account.id, role = %account.role, "Login");
    Ok(AuthResponse {
        token,
        role: account.role,
        message: None,
    })
}

pub async fn signup(
    store: &dyn TimetableStore,
    sessions: &SessionManager,
    req: SignupRequest,
) -> TimetableResult<AuthResponse> {
    let (Some(name), Some(email), Some(password), Some(role), Some(college_id)) = (
        present(&req.name),
        present(&req.email),
        secret(&req.password),
        present(&req.role),
        req.college_id,
    ) else {
        return Err(TimetableError::validation("All fields are required"));
    };

    let role = match role.parse::<Role>() {
        Ok(role @ (Role::Student | Role::Faculty)) => role,
        _ => return Err(TimetableError::validation("Role must be student or faculty")),
    };
    if role == Role::Faculty && req.department_id.is_none() {
        return Err(TimetableError::validation("Department is required for faculty"));
    }

    let scope = resolve_scope(store, college_id, req.department_id).await?;
    let max_load = match role {
        Role::Faculty => FACULTY_MAX_LOAD,
        _ => 0,
    };

    let account = create_account(
        store,
        NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role,
            college_id: scope.college_id,
            department_id: scope.department_id,
            max_load,
        },
    )
    .await?;

    let token = sessions.issue(account.id, &account.email, account.role)?;
    store
        .append_audit(Some(account.id), &AuditAction::Signup.to_string())
        .await?;

    metrics::counter!("auth.signups").increment(1);
    info!(account_id = account.id, role = %account.role, "Account created");
    Ok(AuthResponse {
        token,
        role: account.role,
        message: Some("User created successfully".to_string()),
    })
}

pub async fn admin_signup(
    store: &dyn TimetableStore,
    sessions: &SessionManager,
    req: AdminSignupRequest,
) -> TimetableResult<AuthResponse> {
    let (Some(name), Some(email), Some(password), Some(invitation), Some(college_id)) = (
        present(&req.name),
        present(&req.email),
        secret(&req.password),
        present(&req.invitation_token),
        req.college_id,
    ) else {
        return Err(TimetableError::validation("All fields are required"));
    };

    // Invitation is checked before anything that reveals account state.
    let token_hash = hash_token(invitation);
    if store.find_active_invitation(&token_hash, Utc::now()).await?.is_none() {
        metrics::counter!("auth.admin_signup.rejected").increment(1);
        warn!("Admin signup with invalid invitation");
        return Err(TimetableError::forbidden("Invalid admin invitation"));
    }

    let scope = resolve_scope(store, college_id, req.department_id).await?;
    if store.find_account_by_email(email).await?.is_some() {
        return Err(TimetableError::DuplicateEmail);
    }
    let password_hash = hash_password(password)?;

    let Some(invitation) = store.consume_invitation(&token_hash, Utc::now()).await? else {
        metrics::counter!("auth.admin_signup.rejected").increment(1);
        return Err(TimetableError::forbidden("Invalid admin invitation"));
    };

    let account = create_account(
        store,
        NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::Admin,
            college_id: scope.college_id,
            department_id: scope.department_id,
            max_load: ADMIN_MAX_LOAD,
        },
    )
    .await?;

    let token = sessions.issue(account.id, &account.email, account.role)?;
    store
        .append_audit(Some(account.id), &AuditAction::AdminSignup.to_string())
        .await?;

    metrics::counter!("auth.admin_signups").increment(1);
    info!(account_id = account.id, invitation_id = invitation.id, "Admin account created");
    Ok(AuthResponse {
        token,
        role: account.role,
        message: Some("Admin user created successfully".to_string()),
    })
}

/// Issue a fresh admin invitation. `created_by` is `None` for CLI issuance.
pub async fn issue_invitation(
    store: &dyn TimetableStore,
    created_by: Option<DbId>,
    ttl_hours: i64,
) -> TimetableResult<InvitationResponse> {
    if ttl_hours <= 0 {
        return Err(TimetableError::validation("Invitation lifetime must be positive"));
    }

    let issued = generate_invitation(ttl_hours).map_err(|err| TimetableError::validation(err.to_string()))?;
    let invitation = store
        .insert_invitation(&issued.token_hash, created_by, issued.expires_at)
        .await?;
    store
        .append_audit(
            created_by,
            &AuditAction::IssueInvitation {
                invitation_id: invitation.id,
            }
            .to_string(),
        )
        .await?;

    metrics::counter!("auth.invitations.issued").increment(1);
    info!(invitation_id = invitation.id, expires_at = %invitation.expires_at, "Admin invitation issued");
    Ok(InvitationResponse {
        token: issued.token,
        expires_at: invitation.expires_at,
    })
}

/// Insert an account after the cross-table email pre-check. A unique
/// violation from a concurrent signup is reported the same way.
async fn create_account(store: &dyn TimetableStore, account: NewAccount) -> TimetableResult<Account> {
    if store.find_account_by_email(&account.email).await?.is_some() {
        return Err(TimetableError::DuplicateEmail);
    }
    insert_account(store, account).await
}

async fn insert_account(store: &dyn TimetableStore, account: NewAccount) -> TimetableResult<Account> {
    store.insert_account(account).await.map_err(|err| {
        if err.is_unique_violation() {
            TimetableError::DuplicateEmail
        } else {
            err.into()
        }
    })
}
