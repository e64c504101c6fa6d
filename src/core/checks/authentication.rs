// src/core/checks/authentication.rs

// Credential-free authentication checks: everything here works off the
// discovered form inventory without ever attempting a login.

use tracing::warn;

use crate::core::models::{ControlResult, Endpoint, Finding};

const POLICY_HINT_WORDS: &[&str] = &["min", "length", "uppercase", "special"];

fn password_forms(endpoints: &[Endpoint]) -> Vec<&Endpoint> {
    endpoints
        .iter()
        .filter(|ep| {
            ep.form
                .as_ref()
                .is_some_and(|form| form.inputs.iter().any(|input| input.kind == "password"))
        })
        .collect()
}

fn has_policy_hint(endpoint: &Endpoint) -> bool {
    let Some(form) = endpoint.form.as_ref() else {
        return false;
    };
    form.inputs.iter().any(|input| {
        input
            .placeholder
            .as_deref()
            .map(str::to_ascii_lowercase)
            .is_some_and(|text| POLICY_HINT_WORDS.iter().any(|word| text.contains(word)))
    })
}

/// Password forms should surface their policy (minimum length, character
/// classes) next to the input. A form with no such hint fails.
pub fn run_password_policy(endpoints: &[Endpoint]) -> ControlResult {
    let candidates = password_forms(endpoints);
    let mut findings = Vec::new();

    for endpoint in &candidates {
        if !has_policy_hint(endpoint) {
            warn!(url = %endpoint.url, "password form without a policy hint");
            findings.push(Finding::new(
                "Password_Policy",
                &endpoint.url,
                "no_policy_hint",
            ));
            break;
        }
    }

    ControlResult::verdict("Password_Policy", !candidates.is_empty(), findings)
}

/// Credentials must never be submitted over cleartext HTTP.
pub fn run_password_transport(endpoints: &[Endpoint]) -> ControlResult {
    let candidates = password_forms(endpoints);
    let mut findings = Vec::new();

    for endpoint in &candidates {
        if endpoint.url.starts_with("http://") {
            warn!(url = %endpoint.url, "password form posts over cleartext http");
            findings.push(Finding::new(
                "Password_Encryption_Transit",
                &endpoint.url,
                "login_form_not_https",
            ));
            break;
        }
    }

    ControlResult::verdict("Password_Encryption_Transit", !candidates.is_empty(), findings)
}
