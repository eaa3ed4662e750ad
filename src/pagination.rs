//! Full-collection fetching over offset/limit pagination
//!
//! [`collect_all`] learns the total from the first page, then fetches the
//! remaining pages in sequential batches of at most `concurrency` requests.
//! Items come back in page order regardless of which request in a batch
//! finishes first.
//!
//! The backend's `total` is taken from the first page only. If the collection
//! changes while later pages are fetched, items can shift across page
//! boundaries and be duplicated or missed; callers needing a consistent
//! snapshot must filter on a stable cut-off (e.g. `created_before`).
//!
//! # Example
//!
//! ```no_run
//! use docflow_client::{ApiClient, ApiRequest, CollectOptions};
//! use docflow_client::pagination::collect_all;
//!
//! # async fn example(client: ApiClient) -> docflow_client::Result<()> {
//! let base = ApiRequest::get("/invoices").query("status", "approved");
//! let invoices: Vec<serde_json::Value> = collect_all(
//!     |page| {
//!         let client = client.clone();
//!         let base = base.clone();
//!         async move { client.get_page(&base, page).await }
//!     },
//!     CollectOptions::default(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{ApiClient, ApiRequest};
use crate::config::CollectOptions;
use crate::error::{Error, Result};
use crate::types::{Page, PageRequest};
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Largest item buffer reserved up front from a backend-reported total
const MAX_PREALLOCATED_ITEMS: usize = 10_000;

/// Offsets of every page after the first, in order
///
/// Returns an empty list when the first page already covers `total`.
pub fn page_offsets(total: usize, page_size: usize) -> Vec<usize> {
    remaining_offsets(total, page_size).collect()
}

fn remaining_offsets(total: usize, page_size: usize) -> impl Iterator<Item = usize> {
    let pages = if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    };
    (1..pages).map(move |page| page * page_size)
}

/// Fetch every page of a result set
///
/// `fetch_page` must return the same logical query for every call; only
/// `limit` and `offset` vary.
///
/// # Errors
///
/// - [`Error::Cancelled`] if the cancellation token is tripped before the
///   first fetch or before any batch; no partial result is returned
/// - the first error returned by `fetch_page`
/// - [`Error::Config`] for a zero page size or concurrency
pub async fn collect_all<T, F, Fut>(fetch_page: F, options: CollectOptions) -> Result<Vec<T>>
where
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    options.validate()?;
    let CollectOptions {
        concurrency,
        page_size,
        cancel,
    } = options;

    check_cancelled(cancel.as_ref())?;

    let first = fetch_page(PageRequest {
        limit: page_size,
        offset: 0,
    })
    .await?;

    let total = first.total;
    let mut offsets = remaining_offsets(total, page_size).peekable();
    if offsets.peek().is_none() {
        return Ok(first.items);
    }

    debug!(
        total,
        page_size,
        remaining_pages = total.div_ceil(page_size) - 1,
        concurrency,
        "collecting remaining pages"
    );

    let mut items = Vec::with_capacity(total.min(MAX_PREALLOCATED_ITEMS));
    items.extend(first.items);

    loop {
        let batch: Vec<usize> = offsets.by_ref().take(concurrency).collect();
        if batch.is_empty() {
            break;
        }
        check_cancelled(cancel.as_ref())?;

        let pages = try_join_all(batch.iter().map(|&offset| {
            fetch_page(PageRequest {
                limit: page_size,
                offset,
            })
        }))
        .await?;

        for (page, offset) in pages.into_iter().zip(batch.iter().copied()) {
            if page.total != total {
                warn!(
                    offset,
                    expected = total,
                    reported = page.total,
                    "collection size changed while paging"
                );
            }
            items.extend(page.items);
        }
    }

    debug!(collected = items.len(), total, "collection complete");
    Ok(items)
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

impl ApiClient {
    /// Collect every item of a list endpoint
    ///
    /// `base` carries the path and any filters; paging parameters are added
    /// per page.
    pub async fn collect_list<T: DeserializeOwned>(
        &self,
        base: ApiRequest,
        options: CollectOptions,
    ) -> Result<Vec<T>> {
        collect_all(
            |page| {
                let base = &base;
                async move { self.get_page(base, page).await }
            },
            options,
        )
        .await
    }
}
