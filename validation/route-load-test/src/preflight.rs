//! Checks run before a load test starts.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{RouteClient, RouteRequest};
use crate::config::RunConfig;

/// Offset (degrees, roughly 1 km) of the test route used to validate the center.
const VALIDATION_OFFSET_DEG: f64 = 0.01;

/// Probe `/health`. Failure is reported but never stops the run.
pub async fn check_connectivity(client: &dyn RouteClient) -> bool {
    info!("Testing routing service connectivity");
    match client.health().await {
        Ok(()) => {
            info!("Connectivity test passed");
            true
        }
        Err(e) => {
            warn!(error = %e, "Connectivity test failed, continuing anyway");
            false
        }
    }
}

/// Check the service can route near the configured center.
///
/// Tries a short route to the north-east and, if that fails, one to the
/// south-west. Either one succeeding is enough.
pub async fn validate_center(client: &dyn RouteClient, config: &RunConfig) -> bool {
    info!(center = %config.center(), "Validating center point");

    let center = config.center();
    let offsets = [VALIDATION_OFFSET_DEG, -VALIDATION_OFFSET_DEG];
    let cancel = CancellationToken::new();

    for (attempt, offset) in offsets.into_iter().enumerate() {
        let request = RouteRequest::new(0, center, center.offset(offset, offset));
        match client.fetch_route(request, false, &cancel).await {
            Ok(outcome) if outcome.success => {
                info!(attempt = attempt + 1, "Center point validation passed");
                return true;
            }
            Ok(outcome) => warn!(
                attempt = attempt + 1,
                error = outcome.error_detail.as_deref().unwrap_or("unknown error"),
                "Center point validation failed"
            ),
            Err(e) => warn!(attempt = attempt + 1, error = %e, "Failed to validate center point"),
        }
    }

    false
}
