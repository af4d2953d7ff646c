use tracing::info;

use crate::credentials::Credentials;
use crate::driver::DriverError;
use crate::executor::ActionExecutor;
use crate::types::{Action, ActionKind, ExecutionOutcome};

const USERNAME_FIELD: &str = r#"input[type="email"], input[autocomplete="username"], input[name*="user" i], input[name*="login" i], input[type="text"]"#;
const PASSWORD_FIELD: &str = r#"input[type="password"]"#;
const SUBMIT_CONTROL: &str = r#"button[type="submit"], input[type="submit"], form button"#;

/// `github.com` → `https://github.com`; full URLs pass through.
pub fn site_url(site: &str) -> String {
    let site = site.trim();
    if site.starts_with("http://") || site.starts_with("https://") {
        site.to_string()
    } else {
        format!("https://{site}")
    }
}

/// Fill and submit the site's login form directly. Credentials never go
/// through the model.
pub async fn log_in(
    executor: &dyn ActionExecutor,
    site: &str,
    credentials: &Credentials,
) -> Result<ExecutionOutcome, DriverError> {
    let steps = [
        ActionKind::Navigate {
            url: site_url(site),
        },
        ActionKind::Type {
            selector: USERNAME_FIELD.to_string(),
            text: credentials.username.clone(),
        },
        ActionKind::Type {
            selector: PASSWORD_FIELD.to_string(),
            text: credentials.password.clone(),
        },
        ActionKind::Click {
            selector: SUBMIT_CONTROL.to_string(),
        },
    ];

    for kind in steps {
        let label = kind.name();
        let outcome = executor.execute(&Action::new(kind)).await?;
        if !outcome.success {
            return Ok(ExecutionOutcome::failed(format!(
                "Login stopped at {label}: {}",
                outcome.message
            )));
        }
    }

    info!(%site, "login form submitted");
    Ok(ExecutionOutcome::ok(format!("Logged in to: {site}")))
}
