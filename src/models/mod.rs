pub mod courier;
pub mod delivery;
pub mod event;
pub mod proof;
pub mod tracking;
pub mod zone;
