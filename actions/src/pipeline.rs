//! Inspect/execute orchestration.
//!
//! The single entry point behind both user-facing operations. One
//! `Pipeline` per process is the intended shape: it owns the HTTP
//! connection pool and the shared trust registry, and each call runs a
//! short, strictly-ordered chain of network round trips. Concurrent
//! calls are independent except for the registry snapshot.

use std::sync::Arc;

use crate::client::ActionClient;
use crate::ports::{Ledger, Signer};
use crate::registry::{HttpRegistrySource, RegistrySource, TrustRegistry};
use crate::resolved::ResolvedConfig;
use crate::resolver::{self, CanonicalUrl};
use crate::types::{
    ActionError, ActionMetadata, ActionsConfig, ErrorCode, ExecuteOutcome, ExecutionRequest,
    InspectResult, LinkedAction,
};

pub struct Pipeline {
    client: ActionClient,
    registry: TrustRegistry,
}

impl Pipeline {
    /// Build a pipeline with the default HTTP-backed registry source.
    pub fn new(config: &ActionsConfig) -> Result<Self, ActionError> {
        let resolved = ResolvedConfig::from_config(config)?;
        let client = ActionClient::new(&resolved)?;
        let source = HttpRegistrySource::new(client.http().clone(), resolved.registry_url.clone());
        let registry = TrustRegistry::new(Arc::new(source), resolved.registry_ttl, resolved.refresh_mode);
        Ok(Self { client, registry })
    }

    /// Build a pipeline around an injected registry source. Used by
    /// tests and by embedders with their own trust distribution.
    pub fn with_registry_source(
        config: &ActionsConfig,
        source: Arc<dyn RegistrySource>,
    ) -> Result<Self, ActionError> {
        let resolved = ResolvedConfig::from_config(config)?;
        let client = ActionClient::new(&resolved)?;
        let registry = TrustRegistry::new(source, resolved.registry_ttl, resolved.refresh_mode);
        Ok(Self { client, registry })
    }

    /// Resolve, classify, and describe an Action URL.
    ///
    /// Inspection is read-only and always allowed: a malicious
    /// classification is reported in the result, not enforced, so a
    /// caller can see why a URL should not be executed. Fetch failures
    /// propagate unmodified.
    pub async fn inspect(&self, raw_url: &str) -> Result<InspectResult, ActionError> {
        let canonical = resolver::resolve(raw_url)?;
        let trust = self.registry.status(canonical.host()).await;
        let metadata = self.client.metadata(&canonical).await?;
        let actions = flatten_actions(&canonical, &metadata)?;

        tracing::info!(
            url = canonical.as_str(),
            ?trust,
            actions = actions.len(),
            "inspected action endpoint"
        );

        Ok(InspectResult {
            canonical_url: canonical.to_string(),
            trust,
            metadata,
            actions,
        })
    }

    /// Resolve, gate, fetch, and either simulate or sign-and-submit.
    ///
    /// Exactly one of simulation or submission happens per call: dry
    /// runs never sign and never move funds. There is no implicit
    /// simulate-then-execute chaining; callers wanting that invoke the
    /// pipeline twice and gate the second call themselves.
    pub async fn execute<L, S>(
        &self,
        request: &ExecutionRequest,
        ledger: &L,
        signer: &S,
    ) -> Result<ExecuteOutcome, ActionError>
    where
        L: Ledger + ?Sized,
        S: Signer + ?Sized,
    {
        request.validate()?;
        let canonical = resolver::resolve(&request.raw_url)?;

        // The one place trust is a hard gate: an explicit deny-list hit
        // fails before any protocol call is made.
        let trust = self.registry.status(canonical.host()).await;
        if trust.blocks_execution() {
            return Err(ActionError::new(
                ErrorCode::UntrustedHostBlocked,
                format!("host {} is on the malicious list", canonical.host()),
                false,
            )
            .with_detail("host", canonical.host().to_string()));
        }

        let transaction = self
            .client
            .transaction(&canonical, &request.account, &request.params)
            .await?;

        if request.dry_run {
            let simulation = ledger.simulate(&transaction.transaction).await?;
            tracing::info!(
                url = canonical.as_str(),
                success = simulation.success,
                units = simulation.units_consumed,
                "dry run simulated"
            );
            Ok(ExecuteOutcome::Simulated { simulation, trust })
        } else {
            let signed = signer.sign(&transaction.transaction)?;
            let signature = ledger.submit(&signed).await?;
            tracing::info!(url = canonical.as_str(), %signature, "transaction submitted");
            Ok(ExecuteOutcome::Submitted { signature, trust })
        }
    }
}

/// Flatten `metadata.links.actions` into a normalized list with absolute
/// hrefs. An endpoint without linked actions is itself the single
/// action.
fn flatten_actions(
    base: &CanonicalUrl,
    metadata: &ActionMetadata,
) -> Result<Vec<LinkedAction>, ActionError> {
    let Some(links) = &metadata.links else {
        return Ok(vec![LinkedAction {
            label: metadata
                .label
                .clone()
                .unwrap_or_else(|| metadata.title.clone()),
            href: base.to_string(),
            parameters: Vec::new(),
        }]);
    };

    links
        .actions
        .iter()
        .map(|action| {
            Ok(LinkedAction {
                label: action.label.clone(),
                href: base.join(&action.href)?,
                parameters: action.parameters.clone(),
            })
        })
        .collect()
}
