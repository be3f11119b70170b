//! Collecting every page of a list endpoint

use docean_api::{ListOptions, Page};
use docean_cloud::{Context, Result};
use std::future::Future;

/// Page size used when walking whole collections
pub const PER_PAGE: u32 = 200;

/// Fetch pages until the links report the last one
pub async fn collect_all<T, F, Fut>(ctx: &Context, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = docean_api::Result<Page<T>>>,
{
    let mut opt = ListOptions::new(1, PER_PAGE);
    let mut items = Vec::new();
    loop {
        let page = ctx.run(fetch(opt)).await??;
        let last = page.is_last();
        tracing::debug!("fetched page {} with {} items", opt.page, page.items.len());
        items.extend(page.items);
        if last {
            return Ok(items);
        }
        opt = opt.next();
    }
}
