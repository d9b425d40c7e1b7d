//! `window.location` / `window.history` as a [`Navigator`]

use stride_http::{ClientError, Navigator};
use url::Url;
use wasm_bindgen::JsValue;

/// The page the application runs in
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn current_url(&self) -> Result<Url, ClientError> {
        let href = window()?.location().href().map_err(navigation)?;
        Url::parse(&href).map_err(|e| ClientError::Navigation(format!("bad location {href}: {e}")))
    }

    fn redirect(&self, url: &Url) -> Result<(), ClientError> {
        window()?.location().assign(url.as_str()).map_err(navigation)
    }

    fn replace_url(&self, url: &Url) -> Result<(), ClientError> {
        window()?
            .history()
            .map_err(navigation)?
            .replace_state_with_url(&JsValue::NULL, "", Some(url.as_str()))
            .map_err(navigation)
    }
}

fn window() -> Result<web_sys::Window, ClientError> {
    web_sys::window().ok_or_else(|| ClientError::Navigation("no window".into()))
}

fn navigation(value: JsValue) -> ClientError {
    ClientError::Navigation(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}
