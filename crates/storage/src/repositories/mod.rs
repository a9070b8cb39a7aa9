pub mod license_repo;
pub mod mentor_repo;
pub mod signal_repo;
pub mod student_repo;

pub use license_repo::LicenseRepository;
pub use mentor_repo::MentorRepository;
pub use signal_repo::SignalRepository;
pub use student_repo::StudentRepository;
