//! Draining paginated listings page by page.
//!
//! Pages are requested strictly in order and one at a time. The drain stops after the
//! first page for which the last-page predicate returns `true`; a predicate that never
//! does so keeps the drain running, so callers that cannot trust the API's paging
//! metadata should bound it themselves (for example `page >= max_pages`).

use std::future::Future;

use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::jsonapi::Page;

pub const DEFAULT_START_PAGE: u32 = 1;

/// Fetches every page starting at page 1 and returns them in page order.
pub async fn drain<T, E, F, Fut, P>(fetch_page: F, is_last_page: P) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T, u32) -> bool,
{
    drain_from(fetch_page, is_last_page, DEFAULT_START_PAGE).await
}

/// Like [`drain`], starting at `start_page`. The first failing fetch aborts the drain.
pub async fn drain_from<T, E, F, Fut, P>(
    mut fetch_page: F,
    mut is_last_page: P,
    start_page: u32,
) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T, u32) -> bool,
{
    let mut pages = Vec::new();
    let mut page = start_page;
    loop {
        debug!(page, "Fetching page");
        let result = fetch_page(page).await?;
        let last = is_last_page(&result, page);
        pages.push(result);
        if last {
            break;
        }
        page += 1;
    }
    info!(pages = pages.len(), start_page, "Pagination drained");
    Ok(pages)
}

struct DrainState<F, P> {
    fetch_page: F,
    is_last_page: P,
    next_page: Option<u32>,
}

/// Streaming variant of [`drain_from`]: each page is yielded as soon as it arrives.
///
/// The next page is only requested when the consumer polls for it. After an error the
/// stream yields that error and ends.
pub fn drain_stream<T, E, F, Fut, P>(
    fetch_page: F,
    is_last_page: P,
    start_page: u32,
) -> impl Stream<Item = Result<T, E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T, u32) -> bool,
{
    let state = DrainState {
        fetch_page,
        is_last_page,
        next_page: Some(start_page),
    };
    stream::unfold(state, |mut state| async move {
        let page = state.next_page?;
        debug!(page, "Fetching page");
        match (state.fetch_page)(page).await {
            Ok(result) => {
                state.next_page = if (state.is_last_page)(&result, page) {
                    None
                } else {
                    Some(page + 1)
                };
                Some((Ok(result), state))
            }
            Err(err) => {
                state.next_page = None;
                Some((Err(err), state))
            }
        }
    })
}

/// Writes every stream item as one line of JSON, flushing after each line.
/// Returns the number of lines written. The first error stops the write.
pub async fn write_ndjson<S, T, E, W>(records: S, writer: &mut W) -> Result<usize, E>
where
    S: Stream<Item = Result<T, E>>,
    T: Serialize,
    W: AsyncWrite + Unpin,
    E: From<std::io::Error> + From<serde_json::Error>,
{
    let mut records = std::pin::pin!(records);
    let mut written = 0;
    while let Some(record) = records.next().await {
        let mut line = serde_json::to_vec(&record?)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}

/// `true` for an empty page or one holding fewer items than requested.
pub fn is_last_page_by_size(item_count: usize, page_size: u32) -> bool {
    item_count == 0 || item_count < page_size as usize
}

/// Last-page check for a raw JSON:API document.
///
/// When the document carries `links`, the absence of `links.next` decides. Otherwise the
/// number of primary resources is compared with `page_size`.
pub fn is_last_page_by_links(document: &Value, page_size: u32) -> bool {
    match document.get("links") {
        Some(Value::Object(links)) => links.get("next").is_none_or(Value::is_null),
        _ => {
            let count = document.get("data").and_then(Value::as_array).map_or(0, Vec::len);
            is_last_page_by_size(count, page_size)
        }
    }
}

impl<T> Page<T> {
    /// Same rule as [`is_last_page_by_links`], applied to a mapped page.
    pub fn is_last(&self, page_size: u32) -> bool {
        match &self.links {
            Some(Value::Object(links)) => links.get("next").is_none_or(Value::is_null),
            _ => is_last_page_by_size(self.items.len(), page_size),
        }
    }
}
