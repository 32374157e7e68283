//! In-memory implementation of [`Indexer`].
//!
//! Documents are tokenized once on insert (lowercased, split on anything
//! that isn't alphanumeric). Searches scan every document under the read
//! lock and copy the ranked page out, so callers iterate without holding
//! the lock.
//!
//! Results are ordered by `page_rank` descending, then relevance (number of
//! term or phrase hits, title hits counting double) descending, then link ID.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use linkgraph_core::{time, LinkId};

use crate::document::{Document, Query, QueryType};
use crate::error::IndexError;
use crate::traits::{DocIterator, Indexer, SearchCursor};

/// A document plus its pre-split text.
#[derive(Debug)]
struct Entry {
    doc: Document,
    title: Vec<String>,
    content: Vec<String>,
}

impl Entry {
    fn new(doc: Document) -> Self {
        Entry {
            title: tokenize(&doc.title),
            content: tokenize(&doc.content),
            doc,
        }
    }

    /// Relevance of this entry for `terms`, zero when it doesn't match.
    fn relevance(&self, query_type: QueryType, terms: &[String]) -> usize {
        let hits = |tokens: &[String]| match query_type {
            QueryType::Match => tokens.iter().filter(|t| terms.contains(t)).count(),
            QueryType::Phrase => tokens.windows(terms.len()).filter(|w| *w == terms).count(),
        };
        2 * hits(&self.title) + hits(&self.content)
    }
}

/// Lowercased alphanumeric tokens of `text`.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// In-memory document index.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    docs: RwLock<HashMap<LinkId, Entry>>,
}

impl InMemoryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        InMemoryIndex::default()
    }

    /// Number of indexed documents, placeholders included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing has been indexed or scored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<LinkId, Entry>> {
        match self.docs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("in-memory index lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<LinkId, Entry>> {
        match self.docs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("in-memory index lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Indexer for InMemoryIndex {
    fn index(&self, doc: &mut Document) -> Result<(), IndexError> {
        if doc.link_id.is_nil() {
            return Err(IndexError::MissingLinkId);
        }

        let mut docs = self.write();
        doc.indexed_at = time::now();
        if let Some(existing) = docs.get(&doc.link_id) {
            doc.page_rank = existing.doc.page_rank;
        }
        docs.insert(doc.link_id, Entry::new(doc.clone()));
        debug!(id = %doc.link_id, url = %doc.url, "indexed document");
        Ok(())
    }

    fn find_by_id(&self, id: LinkId) -> Result<Document, IndexError> {
        self.read()
            .get(&id)
            .map(|entry| entry.doc.clone())
            .ok_or(IndexError::NotFound { id })
    }

    fn search(&self, query: &Query) -> Result<DocIterator, IndexError> {
        let terms = tokenize(&query.expression);
        if terms.is_empty() {
            return Ok(Box::new(SearchResults::new(Vec::new(), 0)));
        }

        let docs = self.read();
        let mut hits: Vec<(usize, &Document)> = docs
            .values()
            .map(|entry| (entry.relevance(query.query_type, &terms), &entry.doc))
            .filter(|(relevance, _)| *relevance > 0)
            .collect();
        hits.sort_by(|(ra, a), (rb, b)| rank(*ra, a, *rb, b));

        let total = hits.len() as u64;
        let page: Vec<Document> = hits
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .map(|(_, doc)| doc.clone())
            .collect();
        debug!(expression = %query.expression, total, "searched index");
        Ok(Box::new(SearchResults::new(page, total)))
    }

    fn update_score(&self, id: LinkId, score: f64) -> Result<(), IndexError> {
        let mut docs = self.write();
        match docs.get_mut(&id) {
            Some(entry) => entry.doc.page_rank = score,
            None => {
                let placeholder = Document {
                    link_id: id,
                    page_rank: score,
                    ..Document::default()
                };
                docs.insert(id, Entry::new(placeholder));
                debug!(%id, "created placeholder document");
            }
        }
        debug!(%id, score, "updated score");
        Ok(())
    }
}

fn rank(ra: usize, a: &Document, rb: usize, b: &Document) -> Ordering {
    b.page_rank
        .total_cmp(&a.page_rank)
        .then(rb.cmp(&ra))
        .then(a.link_id.cmp(&b.link_id))
}

/// Cursor over a ranked page copied out of the index.
#[derive(Debug)]
struct SearchResults {
    docs: std::vec::IntoIter<Document>,
    current: Option<Document>,
    total: u64,
    done: bool,
}

impl SearchResults {
    fn new(docs: Vec<Document>, total: u64) -> Self {
        SearchResults {
            docs: docs.into_iter(),
            current: None,
            total,
            done: false,
        }
    }
}

impl SearchCursor for SearchResults {
    fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.current = self.docs.next();
        self.done = self.current.is_none();
        !self.done
    }

    fn error(&self) -> Option<&IndexError> {
        None
    }

    fn document(&self) -> Option<Document> {
        self.current.clone()
    }

    fn total_count(&self) -> u64 {
        self.total
    }

    fn close(&mut self) -> Result<(), IndexError> {
        self.done = true;
        self.current = None;
        self.docs = Vec::new().into_iter();
        Ok(())
    }
}
