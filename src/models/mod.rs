pub mod action;
pub mod delivery;
pub mod gig;
pub mod location;
pub mod payment;
pub mod rating;
pub mod shop;
