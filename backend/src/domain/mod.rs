//! Domain services. Each service owns the business rules for one area and
//! leans on the repositories in `storage` for persistence; role checks all
//! flow through `visibility`.

pub mod accounts;
pub mod attendance;
pub mod billing;
pub mod children;
pub mod feed;
pub mod identity;
pub mod messaging;
pub mod models;
pub mod payments;
pub mod visibility;

pub use accounts::AccountService;
pub use attendance::AttendanceService;
pub use billing::BillingService;
pub use children::ChildService;
pub use feed::FeedService;
pub use messaging::MessagingService;
pub use payments::PaymentService;
