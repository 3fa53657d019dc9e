//! Remote operation catalog.
//!
//! Holds the descriptors announced by peers, keyed by
//! `(connection, queue, path, version)`. Each `operations` announcement is a
//! full replacement of its source queue's entries: everything announced is
//! stamped with the ingest time, then every entry of that queue with an
//! older stamp is swept. Stamps come from a [`ClockSource`] and are forced
//! strictly increasing per catalog, so the sweep stays correct even when
//! two announcements land in the same millisecond.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sop_core::descriptor::{tag_option, TAG_DEFAULT_ACL};
use sop_core::messages::OperationAnnouncement;
use sop_core::{
    ClockSource, OperationAddress, OperationDescription, OperationDescriptor, OperationFilter,
    Version,
};
use tracing::{debug, warn};

/// Identity of a remote catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteKey {
    pub connection: String,
    pub queue: String,
    pub path: String,
    pub version: String,
}

/// What one announcement changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: usize,
    pub refreshed: usize,
    pub evicted: usize,
}

struct CatalogState {
    entries: HashMap<RemoteKey, OperationDescriptor>,
    last_stamp: u64,
}

/// Descriptors announced by peers, owned by one federation provider.
pub struct RemoteCatalog {
    provider_name: String,
    clock: Arc<dyn ClockSource>,
    state: Mutex<CatalogState>,
}

impl RemoteCatalog {
    #[must_use]
    pub fn new(provider_name: impl Into<String>, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            provider_name: provider_name.into(),
            clock,
            state: Mutex::new(CatalogState {
                entries: HashMap::new(),
                last_stamp: 0,
            }),
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Applies an `operations` announcement from `queue` on `connection`.
    pub fn ingest(
        &self,
        connection: &str,
        queue: &str,
        announcements: &[OperationAnnouncement],
    ) -> IngestReport {
        let announced: Vec<(RemoteKey, OperationDescriptor)> = announcements
            .iter()
            .filter_map(|a| self.remote_descriptor(connection, queue, a))
            .collect();

        let mut report = IngestReport::default();
        {
            let mut state = self.state.lock();
            let now = self.clock.now().max(state.last_stamp + 1);
            state.last_stamp = now;

            for (key, descriptor) in announced {
                match state.entries.get_mut(&key) {
                    Some(existing) => {
                        existing.set_last_updated(now);
                        report.refreshed += 1;
                    }
                    None => {
                        state.entries.insert(key, descriptor.with_last_updated(now));
                        report.added += 1;
                    }
                }
            }

            let before = state.entries.len();
            state
                .entries
                .retain(|k, d| k.queue != queue || d.last_updated().unwrap_or(0) >= now);
            report.evicted = before - state.entries.len();
        }

        if report.evicted > 0 {
            metrics::counter!("sop_federation_evicted_total").increment(report.evicted as u64);
            debug!(queue, evicted = report.evicted, "stale remote operations removed");
        }
        debug!(
            queue,
            connection,
            added = report.added,
            refreshed = report.refreshed,
            "remote operations ingested"
        );
        report
    }

    fn remote_descriptor(
        &self,
        connection: &str,
        queue: &str,
        announcement: &OperationAnnouncement,
    ) -> Option<(RemoteKey, OperationDescriptor)> {
        let version = match Version::parse(&announcement.version) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %announcement.path, error = %e, "skipping announced operation");
                return None;
            }
        };
        let address = match OperationAddress::compose(
            &self.provider_name,
            &announcement.path,
            Some(&version),
            &[queue, connection],
        ) {
            Ok(a) => a,
            Err(e) => {
                warn!(path = %announcement.path, error = %e, "skipping announced operation");
                return None;
            }
        };

        let key = RemoteKey {
            connection: connection.to_string(),
            queue: queue.to_string(),
            path: announcement.path.clone(),
            version: version.to_string(),
        };

        let mut description =
            OperationDescription::from_path(announcement.path.clone(), version, announcement.title.clone());
        if let Some(form) = &announcement.form {
            let form = serde_json::from_str(form)
                .unwrap_or_else(|_| serde_json::Value::String(form.clone()));
            description = description.with_form(form);
        }
        let acl = tag_option(&announcement.tags, TAG_DEFAULT_ACL, "").to_string();
        let descriptor = OperationDescriptor::new(address, &description, announcement.tags.clone(), acl);
        Some((key, descriptor))
    }

    /// Every entry matching `filter`.
    #[must_use]
    pub fn find_matching(&self, filter: &OperationFilter) -> Vec<OperationDescriptor> {
        self.state
            .lock()
            .entries
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    /// Looks up the entry behind a remote address.
    ///
    /// An address carrying `queue/connection` parts names one entry; without
    /// parts, any entry with the same `path:version` answers.
    #[must_use]
    pub fn get(&self, address: &OperationAddress) -> Option<OperationDescriptor> {
        let state = self.state.lock();
        if address.part_count() >= 2 {
            let key = RemoteKey {
                connection: address.part(1).to_string(),
                queue: address.part(0).to_string(),
                path: address.path().to_string(),
                version: address.version_string(),
            };
            return state.entries.get(&key).cloned();
        }
        let registry_key = address.registry_key();
        state
            .entries
            .values()
            .find(|d| d.registry_key() == registry_key)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
