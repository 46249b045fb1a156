pub mod booking;
pub mod directory;
pub mod lifecycle;
pub mod notification;
pub mod store;

pub use booking::BookingCoordinator;
pub use directory::{Directory, SqlDirectory};
pub use lifecycle::AppointmentLifecycleService;
pub use notification::{NotificationInbox, Notifier, NotifyError, StoreNotifier, WebhookNotifier};
pub use store::AppointmentStore;
