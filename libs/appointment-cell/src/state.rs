// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use doctor_cell::SlotStore;
use shared_config::AppConfig;

use crate::services::{
    AppointmentStore, BookingCoordinator, Directory, NotificationInbox, Notifier, SqlDirectory,
    StoreNotifier, WebhookNotifier,
};

/// Shared handler state for the scheduling routes.
#[derive(Clone)]
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub slots: SlotStore,
    pub appointments: AppointmentStore,
    pub coordinator: BookingCoordinator,
    pub directory: Arc<dyn Directory>,
    pub inbox: NotificationInbox,
}

impl SchedulingState {
    /// Uses the webhook notifier when `NOTIFY_WEBHOOK_URL` is set, the inbox table otherwise.
    pub fn new(config: Arc<AppConfig>, pool: SqlitePool) -> Self {
        let notifier: Arc<dyn Notifier> = match config.notify_webhook_url.as_deref() {
            Some(url) => {
                info!("Delivering appointment notifications to webhook {}", url);
                Arc::new(WebhookNotifier::new(url, config.notify_timeout()))
            }
            None => {
                info!("Storing appointment notifications in the inbox table");
                Arc::new(StoreNotifier::new(pool.clone()))
            }
        };

        Self::with_notifier(config, pool, notifier)
    }

    pub fn with_notifier(config: Arc<AppConfig>, pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        let directory: Arc<dyn Directory> = Arc::new(SqlDirectory::new(pool.clone()));
        let notify_timeout = config.notify_timeout();

        Self {
            config,
            slots: SlotStore::new(pool.clone()),
            appointments: AppointmentStore::new(pool.clone()),
            coordinator: BookingCoordinator::new(pool.clone(), directory.clone(), notifier)
                .with_notify_timeout(notify_timeout),
            directory,
            inbox: NotificationInbox::new(pool),
        }
    }
}
