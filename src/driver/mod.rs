//! The page-rendering capability the pipeline drives.
//!
//! One session, one current document. Every method takes `&mut self`: the
//! pipeline never holds two outstanding interactions against the same page.

#[cfg(feature = "browser")]
pub mod chrome;
pub mod snapshot;

use std::time::Duration;

use crate::error::DriverError;

#[allow(async_fn_in_trait)]
pub trait PageDriver {
    /// Handle to an element of the current document.
    type Element;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    async fn query_selector(&mut self, selector: &str)
        -> Result<Option<Self::Element>, DriverError>;

    async fn query_selector_all(&mut self, selector: &str)
        -> Result<Vec<Self::Element>, DriverError>;

    /// First descendant of `parent` matching `selector`.
    async fn query_within(
        &mut self,
        parent: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, DriverError>;

    async fn is_visible(&mut self, element: &Self::Element) -> Result<bool, DriverError>;

    async fn inner_text(&mut self, element: &Self::Element) -> Result<String, DriverError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), DriverError>;

    /// Resolves once `selector` matches; `DriverError::Timeout` after `timeout`.
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    async fn wait_for_timeout(&mut self, duration: Duration);

    /// Serialized snapshot of the current DOM.
    async fn content(&mut self) -> Result<String, DriverError>;
}
