//! Connection envelope (edges + page info).

use super::cursor::Cursor;
use super::fetcher::Page;
use crate::filter::Row;
use serde::Serialize;

/// A row together with the cursor pointing at it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Edge<R> {
    pub node: R,
    pub cursor: Cursor,
}

/// Information about the current page.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Cursor of the first edge, absent when there are no edges.
    pub start_cursor: Option<Cursor>,
    /// Cursor of the last edge, absent when there are no edges.
    pub end_cursor: Option<Cursor>,
}

/// Paginated result set, derived entirely from a [`Page`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<R> {
    pub edges: Vec<Edge<R>>,
    pub page_info: PageInfo,
    pub total_count: u64,
}

impl<R: Row> Connection<R> {
    /// Wrap a page. Pure; an empty page yields no edges and no cursors.
    pub fn from_page(page: Page<R>) -> Self {
        let edges: Vec<Edge<R>> = page
            .rows
            .into_iter()
            .map(|node| Edge {
                cursor: Cursor::encode(node.id()),
                node,
            })
            .collect();

        let page_info = PageInfo {
            has_next_page: page.has_next_page && !edges.is_empty(),
            has_previous_page: page.has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self {
            edges,
            page_info,
            total_count: page.total_count,
        }
    }
}

impl<R> Connection<R> {
    /// The rows in page order.
    pub fn nodes(&self) -> impl Iterator<Item = &R> {
        self.edges.iter().map(|e| &e.node)
    }

    pub fn into_nodes(self) -> Vec<R> {
        self.edges.into_iter().map(|e| e.node).collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
