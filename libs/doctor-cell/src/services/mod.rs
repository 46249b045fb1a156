pub mod availability;
pub mod doctor;

pub use availability::SlotStore;
pub use doctor::DoctorService;
