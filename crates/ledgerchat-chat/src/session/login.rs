//! Sign-in dialogue and company selection.
//!
//! While the session is in an auth phase every input is answered here and
//! the intent resolver is never consulted. Passwords are wrapped in
//! [`SecretString`] on arrival and never stored on the session.

use secrecy::SecretString;
use tracing::{debug, info, warn};

use ledgerchat_core::types::TenantCandidate;
use ledgerchat_erp::{ErpBackend, ErpError};
use ledgerchat_intent::{LoginParams, SwitchTenantParams};

use crate::error::ChatError;
use crate::response::Reply;
use crate::session::{PendingLogin, Phase, Session};

const CANCEL_WORD: &str = "cancel";
const HOST_TENANT: &str = "Host/Default";
const DEFAULT_TENANT_LABEL: &str = "Default Tenant";

pub const EMAIL_PROMPT: &str = "Please provide your email address to sign in.";
pub const PASSWORD_PROMPT: &str = "Great. Now, please enter your password to continue.";
pub const NO_COMPANIES: &str =
    "I could not find any companies associated with that email. Please try again.";
pub const INCORRECT_PASSWORD: &str = "Incorrect password. Please try again.";
pub const INVALID_SELECTION: &str =
    "Invalid selection. Please choose from the available companies.";

/// Answer one input of the sign-in dialogue.
pub async fn handle_dialogue(
    session: &mut Session,
    backend: &dyn ErpBackend,
    input: &str,
) -> Result<Reply, ChatError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case(CANCEL_WORD) {
        return cancel(session);
    }

    match session.phase() {
        Phase::AuthEmail => on_email(session, backend, input).await,
        Phase::AuthPassword => on_password(session, backend, input).await,
        Phase::TenantSelection => on_selection(session, input),
        phase => Err(ChatError::InvalidTransition(phase, phase)),
    }
}

fn cancel(session: &mut Session) -> Result<Reply, ChatError> {
    let to = session.resting_phase();
    session.transition_to(to)?;
    info!(session = %session.id(), "Sign-in dialogue cancelled");
    Ok(match to {
        Phase::Ready => Reply::new("Cancelled. I am ready for your commands!"),
        _ => Reply::new("Sign-in cancelled. Say \"login\" whenever you are ready."),
    })
}

async fn on_email(
    session: &mut Session,
    backend: &dyn ErpBackend,
    input: &str,
) -> Result<Reply, ChatError> {
    match backend.lookup_tenants(input).await {
        Ok(tenants) if !tenants.is_empty() => {
            debug!(candidates = tenants.len(), "Tenant discovery succeeded");
            *session.pending_mut() = PendingLogin {
                email: Some(input.to_string()),
                tenants,
                chosen: None,
            };
            session.transition_to(Phase::AuthPassword)?;
            Ok(Reply::new(PASSWORD_PROMPT))
        }
        Ok(_) => Ok(Reply::new(NO_COMPANIES)),
        Err(e) => {
            warn!("Tenant discovery failed: {}", e);
            Ok(Reply::new(format!(
                "I couldn't look up companies for that email right now ({}). Please try again.",
                e
            )))
        }
    }
}

async fn on_password(
    session: &mut Session,
    backend: &dyn ErpBackend,
    input: &str,
) -> Result<Reply, ChatError> {
    let pending = session.pending().cloned().unwrap_or_default();
    let Some(email) = pending.email else {
        let to = session.resting_phase();
        session.transition_to(to)?;
        return Ok(Reply::new("I lost track of your sign-in. Say \"login\" to start again."));
    };

    let password = SecretString::new(input.to_string());
    let tenant_name = pending.chosen.as_ref().map(|c| c.tenancy_name.as_str());

    let token = match backend.authenticate(&email, &password, tenant_name).await {
        Ok(token) => token,
        Err(ErpError::Transport(e)) => {
            warn!("Authentication request failed: {}", e);
            return Ok(Reply::new(format!(
                "I couldn't reach the server ({}). Please enter your password again.",
                e
            )));
        }
        Err(e) => {
            debug!("Password rejected: {}", e);
            return Ok(Reply::new(INCORRECT_PASSWORD));
        }
    };

    session.set_token(token.token);
    session.set_email(Some(email));
    info!(session = %session.id(), "Signed in");

    match pending.chosen {
        Some(chosen) => {
            session.set_tenant_id(Some(chosen.tenant_id.clone()));
            session.transition_to(Phase::Ready)?;
            Ok(Reply::new(context_set(&chosen.tenancy_name)))
        }
        None => {
            // Candidates stay pending for the selection step.
            session.transition_to(Phase::TenantSelection)?;
            Ok(Reply::new(format!(
                "Authentication successful! Please select a company from the list below \
                 (type the name or number):\n\n{}",
                numbered(&pending.tenants)
            )))
        }
    }
}

fn on_selection(session: &mut Session, input: &str) -> Result<Reply, ChatError> {
    let pending = session.pending().cloned().unwrap_or_default();

    let selected = if pending.tenants.is_empty() {
        (!input.is_empty()).then(|| TenantCandidate::new(input, input))
    } else {
        find_candidate(&pending.tenants, input).cloned()
    };
    let Some(selected) = selected else {
        return Ok(Reply::new(INVALID_SELECTION));
    };

    if !pending.tenants.is_empty() {
        session.set_known_tenants(pending.tenants.clone());
    }

    if session.is_authenticated() {
        session.set_tenant_id(Some(selected.tenant_id.clone()));
        session.transition_to(Phase::Ready)?;
        info!(session = %session.id(), tenant = %selected.tenant_id, "Company selected");
        return Ok(Reply::new(context_set(&selected.tenancy_name)));
    }

    if pending.email.is_some() {
        session.pending_mut().chosen = Some(selected.clone());
        session.transition_to(Phase::AuthPassword)?;
        return Ok(Reply::new(format!(
            "Please enter your password for {}.",
            selected.tenancy_name
        )));
    }

    session.set_tenant_id(Some(selected.tenant_id.clone()));
    session.transition_to(Phase::Greeting)?;
    Ok(Reply::new(format!(
        "Company set to \"{}\". Say \"login\" to sign in.",
        selected.tenancy_name
    )))
}

/// Candidate named `choice` (case-insensitive) or at 1-based index `choice`.
pub fn find_candidate<'a>(
    tenants: &'a [TenantCandidate],
    choice: &str,
) -> Option<&'a TenantCandidate> {
    let choice = choice.trim();
    tenants
        .iter()
        .enumerate()
        .find(|(i, t)| {
            t.tenancy_name.eq_ignore_ascii_case(choice) || (i + 1).to_string() == choice
        })
        .map(|(_, t)| t)
}

/// Sign in with credentials given in a single message.
///
/// Returns the reply and whether a token was issued. With an explicit
/// tenant a failure ends the turn; without one the user's companies are
/// discovered and offered for selection.
pub async fn single_shot(
    session: &mut Session,
    backend: &dyn ErpBackend,
    params: &LoginParams,
) -> Result<(Reply, bool), ChatError> {
    let (Some(email), Some(password)) = (params.email.as_deref(), params.password.as_deref())
    else {
        *session.pending_mut() = PendingLogin::default();
        session.transition_to(Phase::AuthEmail)?;
        return Ok((Reply::new(EMAIL_PROMPT), false));
    };

    let explicit = params.tenant_id.as_deref();
    let mut reply = match explicit {
        Some(tenant) => Reply::new(format!("Logging you into tenant: {}...", tenant)),
        None => Reply::new("No tenant provided. Attempting login to default/host account..."),
    };

    let secret = SecretString::new(password.to_string());
    let error = match backend.authenticate(email, &secret, explicit).await {
        Ok(token) => {
            session.set_token(token.token);
            session.set_email(Some(email.to_string()));
            session.set_tenant_id(explicit.map(str::to_string));
            session.transition_to(Phase::Ready)?;
            info!(session = %session.id(), "Signed in");
            reply.push(format!(
                "Successfully authenticated! Current company context: {}.",
                explicit.unwrap_or(HOST_TENANT)
            ));
            return Ok((reply, true));
        }
        Err(e) => e,
    };

    let failure = format!(
        "Authentication failed for {} (email: {}). Error: {}",
        explicit.unwrap_or(DEFAULT_TENANT_LABEL),
        email,
        error
    );

    if explicit.is_some() {
        reply.push(failure);
        return Ok((reply, false));
    }

    match backend.lookup_tenants(email).await {
        Ok(tenants) if !tenants.is_empty() => {
            session.clear_token();
            *session.pending_mut() = PendingLogin {
                email: Some(email.to_string()),
                tenants: tenants.clone(),
                chosen: None,
            };
            session.transition_to(Phase::TenantSelection)?;
            reply.push(failure);
            reply.push(format!(
                "I found {} {} for {}. Please select one (type the name or number) \
                 and I will ask for your password again:\n\n{}",
                tenants.len(),
                if tenants.len() == 1 { "company" } else { "companies" },
                email,
                numbered(&tenants)
            ));
        }
        Ok(_) => reply.push(failure),
        Err(e) => {
            warn!("Tenant discovery after failed login failed: {}", e);
            reply.push(format!(
                "{}. I also couldn't look up your companies: {}",
                failure, e
            ));
        }
    }
    Ok((reply, false))
}

/// Change the active company.
///
/// With a PIN the tenant id is replaced and pushed to the backend context
/// at once. Without one the known companies are offered for selection.
pub fn switch_tenant(
    session: &mut Session,
    backend: &dyn ErpBackend,
    params: &SwitchTenantParams,
) -> Result<Reply, ChatError> {
    if let Some(pin) = params.pin.as_deref() {
        session.set_tenant_id(Some(pin.to_string()));
        backend.set_context(session.call_context());
        info!(session = %session.id(), tenant = %pin, "Company switched by PIN");
        let mut reply = Reply::new(format!("Switching to company with PIN: {}...", pin));
        reply.push(format!(
            "Context switched to company (PIN: {}). All subsequent requests will key off \
             this Company ID.",
            pin
        ));
        return Ok(reply);
    }

    let known = session.known_tenants().to_vec();
    let email = if session.is_authenticated() {
        None
    } else {
        session.email().map(str::to_string)
    };
    *session.pending_mut() = PendingLogin {
        email,
        tenants: known.clone(),
        chosen: None,
    };
    session.transition_to(Phase::TenantSelection)?;

    if known.is_empty() {
        Ok(Reply::new("Which company would you like to switch to? Type its tenant id."))
    } else {
        Ok(Reply::new(format!(
            "Which company would you like to switch to?\n\n{}",
            numbered(&known)
        )))
    }
}

fn context_set(name: &str) -> String {
    format!(
        "Context set to \"{}\". I am ready for your commands! You can ask me to \
         \"Record a sale\", \"Show me a report\", or \"Manage banks\".",
        name
    )
}

fn numbered(tenants: &[TenantCandidate]) -> String {
    tenants
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, t.tenancy_name))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerchat_erp::{MockCall, MockErp};

    fn tenants() -> Vec<TenantCandidate> {
        vec![
            TenantCandidate::new("Acme", "1"),
            TenantCandidate::new("Globex", "2"),
        ]
    }

    async fn say(session: &mut Session, erp: &MockErp, input: &str) -> Reply {
        handle_dialogue(session, erp, input).await.unwrap()
    }

    fn login(email: &str, password: &str, tenant: Option<&str>) -> LoginParams {
        LoginParams {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            tenant_id: tenant.map(str::to_string),
        }
    }

    #[test]
    fn test_find_candidate_by_name_or_index() {
        let list = tenants();
        assert_eq!(find_candidate(&list, "globex").unwrap().tenant_id, "2");
        assert_eq!(find_candidate(&list, " 1 ").unwrap().tenant_id, "1");
        assert!(find_candidate(&list, "3").is_none());
        assert!(find_candidate(&list, "0").is_none());
        assert!(find_candidate(&list, "Initech").is_none());
    }

    #[test]
    fn test_numbered_list() {
        assert_eq!(numbered(&tenants()), "1. Acme\n2. Globex");
    }

    #[tokio::test]
    async fn test_email_with_no_companies_holds_phase() {
        let erp = MockErp::new();
        let mut session = Session::new(20);
        session.transition_to(Phase::AuthEmail).unwrap();

        let reply = say(&mut session, &erp, "nobody@x.com").await;
        assert_eq!(reply.last_message(), Some(NO_COMPANIES));
        assert_eq!(session.phase(), Phase::AuthEmail);
    }

    #[tokio::test]
    async fn test_email_lookup_failure_holds_phase() {
        let erp = MockErp::new().with_tenant_lookup_error("offline");
        let mut session = Session::new(20);
        session.transition_to(Phase::AuthEmail).unwrap();

        let reply = say(&mut session, &erp, "bob@x.com").await;
        assert!(reply.text().contains("offline"));
        assert_eq!(session.phase(), Phase::AuthEmail);
    }

    #[tokio::test]
    async fn test_wrong_password_holds_phase() {
        let erp = MockErp::new().with_user("bob@x.com", "pw", tenants());
        let mut session = Session::new(20);
        session.transition_to(Phase::AuthEmail).unwrap();
        say(&mut session, &erp, "bob@x.com").await;

        let reply = say(&mut session, &erp, "nope").await;
        assert_eq!(reply.last_message(), Some(INCORRECT_PASSWORD));
        assert_eq!(session.phase(), Phase::AuthPassword);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_cancel_returns_to_greeting() {
        let erp = MockErp::new();
        let mut session = Session::new(20);
        session.transition_to(Phase::AuthEmail).unwrap();

        say(&mut session, &erp, "Cancel").await;
        assert_eq!(session.phase(), Phase::Greeting);
        assert!(erp.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_shot_without_password_prompts_for_email() {
        let erp = MockErp::new();
        let mut session = Session::new(20);
        let params = LoginParams {
            email: Some("bob@x.com".into()),
            ..LoginParams::default()
        };

        let (reply, ok) = single_shot(&mut session, &erp, &params).await.unwrap();
        assert!(!ok);
        assert_eq!(reply.last_message(), Some(EMAIL_PROMPT));
        assert_eq!(session.phase(), Phase::AuthEmail);
        assert!(erp.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_shot_with_explicit_tenant() {
        let erp = MockErp::new().with_user("bob@x.com", "pw", tenants());
        let mut session = Session::new(20);

        let params = login("bob@x.com", "pw", Some("Acme"));
        let (reply, ok) = single_shot(&mut session, &erp, &params).await.unwrap();
        assert!(ok);
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.tenant_id(), Some("Acme"));
        assert_eq!(session.email(), Some("bob@x.com"));
        assert_eq!(
            reply.last_message(),
            Some("Successfully authenticated! Current company context: Acme.")
        );
    }

    #[tokio::test]
    async fn test_single_shot_explicit_tenant_failure_is_terminal() {
        let erp = MockErp::new().with_user("bob@x.com", "pw", tenants());
        let mut session = Session::new(20);

        let params = login("bob@x.com", "pw", Some("Initech"));
        let (reply, ok) = single_shot(&mut session, &erp, &params).await.unwrap();
        assert!(!ok);
        assert_eq!(session.phase(), Phase::Greeting);
        assert!(reply.text().contains("Authentication failed for Initech"));
        assert!(!reply.text().contains("pw"));
        assert_eq!(erp.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_single_shot_failure_falls_back_to_discovery() {
        let erp = MockErp::new().with_user("bob@x.com", "pw", tenants());
        let mut session = Session::new(20);

        let params = login("bob@x.com", "wrong", None);
        let (reply, ok) = single_shot(&mut session, &erp, &params).await.unwrap();
        assert!(!ok);
        assert_eq!(session.phase(), Phase::TenantSelection);
        assert_eq!(session.pending().unwrap().tenants.len(), 2);
        assert!(reply.text().contains("1. Acme\n2. Globex"));
        assert_eq!(
            erp.calls()[1],
            MockCall::LookupTenants {
                email: "bob@x.com".into()
            }
        );
    }

    #[tokio::test]
    async fn test_single_shot_discovery_failure_is_reported() {
        let erp = MockErp::new().with_tenant_lookup_error("offline");
        let mut session = Session::new(20);

        let params = login("bob@x.com", "pw", None);
        let (reply, ok) = single_shot(&mut session, &erp, &params).await.unwrap();
        assert!(!ok);
        assert_eq!(session.phase(), Phase::Greeting);
        assert!(reply.text().contains("couldn't look up your companies"));
    }

    #[tokio::test]
    async fn test_switch_with_pin_updates_backend_context() {
        let erp = MockErp::new();
        let mut session = Session::new(20);
        let params = SwitchTenantParams {
            pin: Some("4455".into()),
        };

        let reply = switch_tenant(&mut session, &erp, &params).unwrap();
        assert_eq!(session.tenant_id(), Some("4455"));
        assert_eq!(erp.context().tenant_id.as_deref(), Some("4455"));
        assert_eq!(session.phase(), Phase::Greeting);
        assert!(reply.text().contains("PIN: 4455"));
    }

    #[test]
    fn test_selection_without_list_takes_input_as_id() {
        let mut session = Session::new(20);
        let erp = MockErp::new();
        let params = SwitchTenantParams::default();
        switch_tenant(&mut session, &erp, &params).unwrap();
        assert_eq!(session.phase(), Phase::TenantSelection);

        let reply = on_selection(&mut session, "77").unwrap();
        assert_eq!(session.phase(), Phase::Greeting);
        assert_eq!(session.tenant_id(), Some("77"));
        assert!(reply.text().contains("Say \"login\""));
    }
}
