pub use super::channels::Entity as Channels;
pub use super::jobs::Entity as Jobs;
pub use super::programs::Entity as Programs;
pub use super::tracking_titles::Entity as TrackingTitles;
