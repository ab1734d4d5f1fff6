pub mod deliveries;
pub mod proofs;
pub mod tracking;

pub use deliveries::DeliveryStore;
pub use proofs::ProofOfDeliveryStore;
pub use tracking::TrackingLedger;
