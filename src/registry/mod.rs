pub mod couriers;
pub mod zones;

pub use couriers::CourierDirectory;
pub use zones::ServiceAreaRegistry;
