use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::types::{EndpointStatus, RollupStatus, SiteStatus};
use crate::catalog::Endpoint;

/// Derive the rollup status for one site from the current endpoint statuses.
///
/// An endpoint with no entry in `statuses` (never probed, or its entry
/// expired) counts as unreachable. Both the scheduled path and the on-demand
/// API path go through this function, so the two always agree on identical
/// inputs.
///
/// Priority order: all offline or any critical endpoint offline is red; any
/// offline is yellow; otherwise green. A site with zero endpoints is
/// vacuously green without any lookups.
pub fn compute_site_status(
    site_id: i64,
    endpoints: &[Endpoint],
    statuses: &HashMap<i64, EndpointStatus>,
    now: DateTime<Utc>,
) -> SiteStatus {
    if endpoints.is_empty() {
        return SiteStatus {
            site_id,
            status: RollupStatus::Green,
            online_count: 0,
            offline_count: 0,
            total_count: 0,
            critical_offline: false,
            checked_at: now,
        };
    }

    let mut online = 0u32;
    let mut offline = 0u32;
    let mut critical_offline = false;

    for endpoint in endpoints {
        let reachable =
            statuses.get(&endpoint.id).is_some_and(|status| status.verdict.is_reachable());

        if reachable {
            online += 1;
        } else {
            offline += 1;
            if endpoint.is_critical {
                critical_offline = true;
            }
        }
    }

    let status = if offline == endpoints.len() as u32 || critical_offline {
        RollupStatus::Red
    } else if offline > 0 {
        RollupStatus::Yellow
    } else {
        RollupStatus::Green
    };

    SiteStatus {
        site_id,
        status,
        online_count: online,
        offline_count: offline,
        total_count: endpoints.len() as u32,
        critical_offline,
        checked_at: now,
    }
}
