// Authentication: password hashing, login sessions, the current-user extractor
// and the registration/login handlers shared by both portals.

pub mod extractor;
pub mod handlers;
pub mod password;
pub mod session;

pub use extractor::CurrentUser;
pub use session::SessionStore;
