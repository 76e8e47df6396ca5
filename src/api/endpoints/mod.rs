pub mod health;
pub mod prescriptions;
pub mod summary;
