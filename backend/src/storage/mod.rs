//! SQLite repositories. Thin query layers over the pool; role rules and
//! invariants stay in the domain services.

pub mod attendance;
pub mod children;
pub mod content;
pub mod messages;
pub mod payments;
pub mod users;

pub use attendance::AttendanceRepository;
pub use children::ChildRepository;
pub use content::ContentRepository;
pub use messages::MessageRepository;
pub use payments::PaymentRepository;
pub use users::UserRepository;
