use axum::http::Uri;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;

/// `?limit=&offset=` as sent by clients. Both are optional.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PageQuery {
    /// The effective (limit, offset), clamped to what the server allows.
    pub fn resolve(&self, api: &ApiConfig) -> (usize, usize) {
        let limit = self
            .limit
            .filter(|&l| l > 0)
            .unwrap_or(api.page_size)
            .min(api.max_page_size.max(1));
        // The store takes offsets as i64
        let offset = self.offset.unwrap_or(0).min(i64::MAX as usize);
        (limit, offset)
    }
}

/// The paginated list envelope.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap one page of `results` out of `count`, linking neighbours relative to `uri`.
    ///
    /// Other query parameters (filters) are carried over into the links.
    pub fn new(results: Vec<T>, count: usize, limit: usize, offset: usize, uri: &Uri) -> Self {
        let link = |offset: usize| {
            let kept = uri
                .query()
                .unwrap_or("")
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter(|pair| {
                    let key = pair.split('=').next().unwrap_or("");
                    key != "limit" && key != "offset"
                });
            let query = kept
                .map(str::to_string)
                .chain([format!("limit={limit}"), format!("offset={offset}")])
                .join("&");
            format!("{}?{}", uri.path(), query)
        };
        let next_offset = offset.saturating_add(limit);
        let next = (next_offset < count).then(|| link(next_offset));
        let previous = (offset > 0).then(|| link(offset.saturating_sub(limit)));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}
