//! Domain models. Plain serde + sqlx row types; the services own the rules.

pub mod attendance;
pub mod child;
pub mod content;
pub mod message;
pub mod payment;
pub mod user;

pub use attendance::{Attendance, FacilityClosure};
pub use child::{Child, Group};
pub use content::{DailyMenu, GalleryImage, GalleryItem, Post, PostComment, SpecialActivity};
pub use message::Message;
pub use payment::{Frequency, Payment, RecurringPayment};
pub use user::{Role, User};
