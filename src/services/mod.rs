pub mod notify;
pub mod payments;

pub use notify::{LogNotifier, NotificationKind, Notifier, NotifyError};
pub use payments::{HttpPaymentGateway, PaymentAuthorization, PaymentError, PaymentGateway};
