// crates/core/src/catalog.rs
//! The data-source catalog: known sources and the active pointer.
//!
//! [`CatalogStore`] is the only owner of both. Anything that changes the
//! active source bumps the shared [`RefreshSignal`] so schema views re-fetch.
//! The store does no I/O: the scheduler issues the calls and applies their
//! results here.

use text2sql_types::{
    CatalogSnapshot, DataSource, SourceListing, UploadOutcome, DEFAULT_SOURCE,
    DEFAULT_SOURCE_LABEL,
};

use crate::error::{RequestError, ValidationError};
use crate::refresh::RefreshSignal;

/// Issued by [`CatalogStore::begin_listing`]; a listing result is applied
/// only under the ticket it was requested with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingTicket {
    id: u64,
    epoch: u64,
}

/// What a listing did to the local catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingOutcome {
    /// The source list differs from what was held before.
    pub changed: bool,
    /// The backend reports a different active source than the local pointer.
    pub active_changed: bool,
}

/// A delete the user has been asked to confirm.
///
/// Only [`CatalogStore::prepare_delete`] can create one, so a delete call
/// always goes through the confirmation step first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    name: String,
    prompt: String,
}

impl PendingDeletion {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Delete "<label>"? This cannot be undone.`
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

pub struct CatalogStore {
    sources: Vec<DataSource>,
    active: String,
    refresh: RefreshSignal,
    /// Bumped on every local mutation; listings issued under an older epoch
    /// are discarded when they land.
    epoch: u64,
    next_listing: u64,
    /// Newest listing applied so far. Older ones landing late are dropped.
    applied_listing: u64,
}

impl CatalogStore {
    pub fn new(refresh: RefreshSignal) -> Self {
        let mut built_in = DataSource::built_in();
        built_in.active = true;
        Self {
            sources: vec![built_in],
            active: DEFAULT_SOURCE.to_string(),
            refresh,
            epoch: 0,
            next_listing: 0,
            applied_listing: 0,
        }
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn get(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Display label of the active source, with a fixed fallback while the
    /// catalog does not know it yet.
    pub fn active_label(&self) -> String {
        self.get(&self.active)
            .map(|s| s.display_name.clone())
            .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string())
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            sources: self.sources.clone(),
            active: self.active.clone(),
            active_label: self.active_label(),
        }
    }

    /// Ticket for a listing about to be requested.
    pub fn begin_listing(&mut self) -> ListingTicket {
        self.next_listing += 1;
        ListingTicket {
            id: self.next_listing,
            epoch: self.epoch,
        }
    }

    /// Apply a listing requested under `ticket`. Failures keep the previous
    /// list; results older than a local change or a newer applied listing
    /// are dropped.
    pub fn apply_listing(
        &mut self,
        ticket: ListingTicket,
        result: Result<SourceListing, RequestError>,
    ) -> ListingOutcome {
        if ticket.epoch != self.epoch || ticket.id <= self.applied_listing {
            tracing::debug!(
                listing = ticket.id,
                epoch = ticket.epoch,
                current = self.epoch,
                applied = self.applied_listing,
                "Dropping stale source listing"
            );
            return ListingOutcome::default();
        }

        let listing = match result {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(error = %e, operation = "list_sources", "Keeping previous source list");
                return ListingOutcome::default();
            }
        };

        self.applied_listing = ticket.id;
        let active_changed = listing.active != self.active;
        let mut sources = listing.databases;
        for source in &mut sources {
            source.active = source.name == listing.active;
        }
        let changed = sources != self.sources;

        self.sources = sources;
        if active_changed {
            tracing::info!(from = %self.active, to = %listing.active, "Backend reports a different active source");
            self.active = listing.active;
            self.refresh.bump();
        }

        ListingOutcome {
            changed,
            active_changed,
        }
    }

    /// The backend acknowledged a switch to `name`.
    pub fn apply_switch(&mut self, name: &str) {
        self.epoch += 1;
        self.set_active(name);
        self.refresh.bump();
        tracing::info!(source = name, "Switched active source");
    }

    /// First step of a delete: check the target and build the confirmation
    /// prompt. Built-in and unknown sources are rejected here, before any
    /// network call.
    pub fn prepare_delete(&self, name: &str) -> Result<PendingDeletion, ValidationError> {
        let source = self.get(name).ok_or_else(|| ValidationError::UnknownSource {
            name: name.to_string(),
        })?;
        if !source.is_uploaded() {
            return Err(ValidationError::BuiltInSource {
                name: name.to_string(),
            });
        }
        Ok(PendingDeletion {
            name: source.name.clone(),
            prompt: format!(
                "Delete \"{}\"? This cannot be undone.",
                source.prompt_label()
            ),
        })
    }

    /// The backend deleted `name`. The caller re-lists to learn what the
    /// backend made active; the local pointer is left alone until then.
    pub fn apply_delete(&mut self, name: &str) {
        self.epoch += 1;
        self.sources.retain(|s| s.name != name);
        tracing::info!(source = name, "Deleted source");
    }

    /// Seed the catalog with a freshly uploaded source and make it active.
    pub fn apply_upload(&mut self, outcome: &UploadOutcome) {
        self.epoch += 1;
        let entry = outcome.data_source();
        match self.sources.iter_mut().find(|s| s.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.sources.push(entry),
        }
        self.set_active(&outcome.table_name);
        self.refresh.bump();
    }

    fn set_active(&mut self, name: &str) {
        self.active = name.to_string();
        for source in &mut self.sources {
            source.active = source.name == name;
        }
    }
}
