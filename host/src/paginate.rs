//! page-counter fetch loop shared by every telemetry endpoint.

use anyhow::Result;
use std::future::Future;

/// everything one pagination run produced
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    pub records: Vec<T>,
    /// pages that returned at least one record
    pub pages: u32,
    /// true when a page failed and `records` is only what came before it
    pub aborted: bool,
}

/// call `fetch_page(1)`, `fetch_page(2)`, ... until a page comes back empty,
/// `max_pages` is reached, or a page fails.
///
/// a failed page ends the loop but keeps what was already collected; the
/// caller can tell from `aborted`.
pub async fn paginate<T, F, Fut>(mut fetch_page: F, max_pages: Option<u32>) -> FetchOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut records = Vec::new();
    let mut page: u32 = 1;
    let mut pages = 0;

    loop {
        if max_pages.is_some_and(|max| page > max) {
            tracing::debug!("[FETCH] Page cap reached at {}", page - 1);
            break;
        }

        match fetch_page(page).await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => {
                tracing::debug!("[FETCH] Page {} returned {} records", page, batch.len());
                records.extend(batch);
                pages += 1;
                page += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "[FETCH] Page {} failed, keeping {} records from earlier pages: {:#}",
                    page,
                    records.len(),
                    e
                );
                return FetchOutcome { records, pages, aborted: true };
            }
        }
    }

    FetchOutcome { records, pages, aborted: false }
}
