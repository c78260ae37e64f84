pub mod notification;

pub use notification::{NotificationItem, Reason, SubjectType};
