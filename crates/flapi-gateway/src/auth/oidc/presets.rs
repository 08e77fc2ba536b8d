//! Named OIDC provider presets (spec §4.4).
//!
//! Presets fill in the issuer URL template and the claim paths a given
//! provider uses for roles/groups, so a config only needs to supply the
//! placeholder values (tenant, realm, domain). A preset whose placeholder
//! is left unsubstituted fails validation rather than silently pointing at
//! a literal `{tenant}` URL.

use flapi_error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub issuer_template: &'static str,
    pub role_claim_path: &'static str,
    pub roles_claim: &'static str,
}

const GOOGLE: ProviderPreset = ProviderPreset {
    name: "google",
    issuer_template: "https://accounts.google.com",
    role_claim_path: "",
    roles_claim: "roles",
};

const MICROSOFT: ProviderPreset = ProviderPreset {
    name: "microsoft",
    issuer_template: "https://login.microsoftonline.com/{tenant}/v2.0",
    role_claim_path: "",
    roles_claim: "roles",
};

const KEYCLOAK: ProviderPreset = ProviderPreset {
    name: "keycloak",
    issuer_template: "{domain}/realms/{realm}",
    role_claim_path: "realm_access.roles",
    roles_claim: "roles",
};

const AUTH0: ProviderPreset = ProviderPreset {
    name: "auth0",
    issuer_template: "https://{domain}/",
    role_claim_path: "",
    roles_claim: "https://flapi/roles",
};

const OKTA: ProviderPreset = ProviderPreset {
    name: "okta",
    issuer_template: "https://{domain}/oauth2/default",
    role_claim_path: "",
    roles_claim: "groups",
};

const GITHUB: ProviderPreset = ProviderPreset {
    name: "github",
    issuer_template: "https://token.actions.githubusercontent.com",
    role_claim_path: "",
    roles_claim: "roles",
};

/// Looks up a preset by name. Unknown names are a configuration error.
pub fn provider_preset(name: &str) -> Result<ProviderPreset, GatewayError> {
    match name {
        "google" => Ok(GOOGLE),
        "microsoft" => Ok(MICROSOFT),
        "keycloak" => Ok(KEYCLOAK),
        "auth0" => Ok(AUTH0),
        "okta" => Ok(OKTA),
        "github" => Ok(GITHUB),
        other => Err(GatewayError::configuration(format!("unknown OIDC provider preset '{other}'"))),
    }
}

/// Substitutes `{tenant}`/`{realm}`/`{domain}` placeholders in a preset's
/// issuer template. Any placeholder left unfilled is a hard failure.
pub fn resolve_issuer(
    preset: &ProviderPreset,
    tenant: Option<&str>,
    realm: Option<&str>,
    domain: Option<&str>,
) -> Result<String, GatewayError> {
    let mut issuer = preset.issuer_template.to_string();
    if let Some(tenant) = tenant {
        issuer = issuer.replace("{tenant}", tenant);
    }
    if let Some(realm) = realm {
        issuer = issuer.replace("{realm}", realm);
    }
    if let Some(domain) = domain {
        issuer = issuer.replace("{domain}", domain);
    }

    if issuer.contains('{') {
        return Err(GatewayError::configuration(format!(
            "OIDC preset '{}' has unresolved placeholders in '{issuer}'",
            preset.name
        )));
    }
    Ok(issuer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_preset_resolves() {
        let preset = provider_preset("google").unwrap();
        assert_eq!(preset.issuer_template, "https://accounts.google.com");
    }

    #[test]
    fn unknown_preset_is_configuration_error() {
        assert!(provider_preset("not-a-provider").is_err());
    }

    #[test]
    fn unresolved_placeholder_fails() {
        let preset = provider_preset("keycloak").unwrap();
        assert!(resolve_issuer(&preset, None, None, Some("https://kc.example.com")).is_err());
    }

    #[test]
    fn fully_substituted_placeholder_succeeds() {
        let preset = provider_preset("keycloak").unwrap();
        let issuer = resolve_issuer(&preset, None, Some("flapi"), Some("https://kc.example.com")).unwrap();
        assert_eq!(issuer, "https://kc.example.com/realms/flapi");
    }

    #[test]
    fn microsoft_tenant_substitution() {
        let preset = provider_preset("microsoft").unwrap();
        let issuer = resolve_issuer(&preset, Some("contoso"), None, None).unwrap();
        assert_eq!(issuer, "https://login.microsoftonline.com/contoso/v2.0");
    }
}
