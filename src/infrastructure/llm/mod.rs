mod rig;

pub use self::rig::{RigProvider, Vendor};
