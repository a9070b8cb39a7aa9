pub mod agent;
pub mod health;
pub mod licenses;
pub mod mentors;
pub mod signals;
pub mod students;
pub mod ws;
