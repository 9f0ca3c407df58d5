//! State threaded through the phases of one run.

use crate::catalog::Catalog;
use crate::config::SyncSettings;
use crate::reconcile::RemoteSnapshot;

/// Everything one run reads and produces.
///
/// Created once from resolved settings. The catalog is filled by the
/// catalog phase, the snapshot by the listing phase, and `processed` by
/// reconciliation; export reads `processed`.
#[derive(Debug)]
pub struct RunContext {
    pub settings: SyncSettings,
    pub catalog: Catalog,
    pub snapshot: RemoteSnapshot,
    /// Target names exported at the end of the run, in processing order.
    pub processed: Vec<String>,
}

impl RunContext {
    #[must_use]
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            catalog: Catalog::new(),
            snapshot: RemoteSnapshot::default(),
            processed: Vec::new(),
        }
    }
}
