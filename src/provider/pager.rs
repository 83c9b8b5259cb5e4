//! Bounded page iteration over paginated provider endpoints.
//!
//! Providers expose heterogeneous pagination contracts: offset-based row
//! windows and continuation tokens that are not immediately consistent.
//! [`Pager`] wraps both behind a lazy, finite, non-restartable sequence of
//! pages, with the inter-page delay supplied as a parameter so tests can
//! run with zero delay.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::DiscoveryError;

/// Continuation marker for the next page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageToken {
    /// Row offset into the result set.
    Offset(usize),
    /// Opaque continuation token handed out by the provider.
    Cursor(String),
}

/// One fetched page.
#[derive(Clone, Debug)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Token for the following page, or `None` when exhausted.
    pub next: Option<PageToken>,
}

/// A paginated provider endpoint.
#[async_trait]
pub trait PageSource: Sync {
    /// Item type produced by this source.
    type Item;

    /// Fetch one page. `token` is `None` for the first page.
    async fn fetch_page(
        &self,
        token: Option<&PageToken>,
    ) -> Result<Page<Self::Item>, DiscoveryError>;
}

/// Lazy, finite, non-restartable sequence of provider pages.
///
/// The sequence ends when the source stops handing out tokens or the page
/// cap is reached, whichever comes first. The delay is applied before each
/// follow-up page, never before the first.
pub struct Pager<'a, S: PageSource> {
    source: &'a S,
    token: Option<PageToken>,
    pages_fetched: usize,
    max_pages: usize,
    follow_delay: Duration,
    cancel: CancellationToken,
    done: bool,
}

impl<'a, S: PageSource> Pager<'a, S> {
    /// Create a pager over `source`, bounded to `max_pages`.
    pub fn new(
        source: &'a S,
        max_pages: usize,
        follow_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            token: None,
            pages_fetched: 0,
            max_pages,
            follow_delay,
            cancel,
            done: max_pages == 0,
        }
    }

    /// Fetch the next page, or `None` when the sequence is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, DiscoveryError> {
        if self.done {
            return Ok(None);
        }

        if self.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        if self.pages_fetched > 0 && self.follow_delay > Duration::ZERO {
            tokio::time::sleep(self.follow_delay).await;
        }

        let page = self.source.fetch_page(self.token.as_ref()).await?;
        self.pages_fetched += 1;
        self.token = page.next;
        self.done = self.token.is_none() || self.pages_fetched >= self.max_pages;

        Ok(Some(page.items))
    }

    /// Drain the whole sequence into one vector.
    pub async fn collect(mut self) -> Result<Vec<S::Item>, DiscoveryError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
