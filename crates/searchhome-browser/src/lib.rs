//! Chrome integration for the search domain tracker: locating and launching
//! the browser, and observing searches in a tab over the DevTools protocol.

mod chrome_finder;
mod error;
mod launcher;
mod navigation;
mod profile;

pub use chrome_finder::{CHROME_PATH_ENV, ChromeFinder};
pub use error::{Error, Result};
pub use launcher::{ChromeLauncher, DEFAULT_DEBUGGING_PORT};
pub use navigation::{
    BrowserNavigator, NavigationEvent, NavigationSession, document_request_events, is_search_url,
};
pub use profile::BrowserProfile;
