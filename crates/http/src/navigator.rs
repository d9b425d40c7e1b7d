//! Access to the browser location

use crate::client::error::ClientError;
use std::sync::{Mutex, PoisonError};
use url::Url;

/// The page location as the identity client sees it
pub trait Navigator {
    /// Full URL of the current page, including query and fragment
    fn current_url(&self) -> Result<Url, ClientError>;

    /// Leave the page for `url`
    fn redirect(&self, url: &Url) -> Result<(), ClientError>;

    /// Rewrite the address bar without navigating
    fn replace_url(&self, url: &Url) -> Result<(), ClientError>;
}

/// In-memory navigator for native hosts and tests
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<Url>,
    redirects: Mutex<Vec<Url>>,
}

impl MemoryNavigator {
    pub fn new(current: Url) -> Self {
        Self {
            current: Mutex::new(current),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Parse `url` as the starting location
    pub fn at(url: &str) -> Result<Self, ClientError> {
        Url::parse(url)
            .map(Self::new)
            .map_err(|e| ClientError::Navigation(format!("invalid url {url}: {e}")))
    }

    /// Pretend the browser arrived at `url`
    pub fn set_current(&self, url: Url) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = url;
    }

    /// Every redirect issued so far, oldest first
    pub fn redirects(&self) -> Vec<Url> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_redirect(&self) -> Option<Url> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for MemoryNavigator {
    fn current_url(&self) -> Result<Url, ClientError> {
        Ok(self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn redirect(&self, url: &Url) -> Result<(), ClientError> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
        Ok(())
    }

    fn replace_url(&self, url: &Url) -> Result<(), ClientError> {
        self.set_current(url.clone());
        Ok(())
    }
}

impl<T: Navigator + ?Sized> Navigator for std::sync::Arc<T> {
    fn current_url(&self) -> Result<Url, ClientError> {
        (**self).current_url()
    }

    fn redirect(&self, url: &Url) -> Result<(), ClientError> {
        (**self).redirect(url)
    }

    fn replace_url(&self, url: &Url) -> Result<(), ClientError> {
        (**self).replace_url(url)
    }
}
