use serde::Serialize;
use strum::{AsRefStr, Display};

/// A step of the startup sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStage {
    /// Configuration bundle validation.
    Configuration,
    /// Validation and serialization rules.
    SchemaAdapter,
    /// Signed cookie verification.
    CookieSigning,
    /// Cross-origin policy.
    Cors,
    /// Client address resolution.
    ClientIp,
    /// Documentation routes.
    Documentation,
    /// Global rate limit.
    RateLimit,
    /// Security response headers.
    SecurityHeaders,
    /// Route trees under the API prefix.
    RouteMount,
    /// Dependency readiness probes.
    Readiness,
    /// OpenAPI document finalization.
    DocumentationPublish,
}

impl BootstrapStage {
    /// Every stage in execution order.
    pub const ALL: [Self; 11] = [
        Self::Configuration,
        Self::SchemaAdapter,
        Self::CookieSigning,
        Self::Cors,
        Self::ClientIp,
        Self::Documentation,
        Self::RateLimit,
        Self::SecurityHeaders,
        Self::RouteMount,
        Self::Readiness,
        Self::DocumentationPublish,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(BootstrapStage::ClientIp.to_string(), "client_ip");
        assert_eq!(
            BootstrapStage::DocumentationPublish.as_ref(),
            "documentation_publish"
        );
    }
}
