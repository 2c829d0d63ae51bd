mod authz;

pub use authz::{Caller, require_thing_access};
