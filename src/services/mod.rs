// Core services
pub mod availability;
pub mod change_events;
pub mod conversion;
pub mod dirty_log;
pub mod locations;
pub mod sync;

pub use availability::{AvailabilityService, ProductAvailability};
pub use change_events::ChangeEventService;
pub use conversion::{convert_units, UomConverter};
pub use dirty_log::{CachedAvailability, DirtyLogService};
pub use locations::InternalLocationResolver;
pub use sync::{SyncReport, SyncService};

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;

/// The wired service graph. Converter and resolver are shared between the
/// aggregator and the change hooks so cache invalidation reaches the
/// instances actually doing the computing.
pub struct Services {
    pub conversion: Arc<UomConverter>,
    pub locations: Arc<InternalLocationResolver>,
    pub availability: Arc<AvailabilityService>,
    pub dirty_log: Arc<DirtyLogService>,
    pub sync: Arc<SyncService>,
    pub change_events: Arc<ChangeEventService>,
}

impl Services {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        events: Option<EventSender>,
    ) -> Self {
        let conversion = Arc::new(UomConverter::new());
        let locations = Arc::new(InternalLocationResolver::new());
        let availability = Arc::new(AvailabilityService::new(
            Arc::clone(&conversion),
            Arc::clone(&locations),
        ));
        let dirty_log = Arc::new(DirtyLogService::new(events.clone()));
        let sync = Arc::new(SyncService::new(
            db,
            Arc::clone(&availability),
            Arc::clone(&dirty_log),
            config.sync_batch_size,
            events.clone(),
        ));
        let change_events = Arc::new(ChangeEventService::new(
            Arc::clone(&dirty_log),
            Arc::clone(&conversion),
            Arc::clone(&locations),
            events,
        ));

        Self {
            conversion,
            locations,
            availability,
            dirty_log,
            sync,
            change_events,
        }
    }
}
