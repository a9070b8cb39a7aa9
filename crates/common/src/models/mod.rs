pub mod license;
pub mod mentor;
pub mod signal;
pub mod student;

pub use license::{LicenseKey, LicenseValidation, ValidationReason};
pub use mentor::{Mentor, MentorRegistration};
pub use signal::{Direction, NewSignal, Signal};
pub use student::{AccountCredentials, Student, StudentState, StudentStatus};
