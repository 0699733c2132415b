pub mod accounts;
pub mod roster;

pub use accounts::{Account, Classroom, Pupil, Teacher};
pub use roster::{load_roster, parse_roster};
