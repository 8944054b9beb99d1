//! Inverted-list operators: term leaves and proximity operators.
//!
//! Every [`IopNode`] is fully evaluated when it is initialized. A term leaf copies
//! its postings from the store; `#NEAR/k` and `#WINDOW/k` walk their (already
//! initialized) arguments once and materialize a synthetic inverted list. After
//! that, parents only read the node through its cursors:
//!
//! - the document cursor (`has_match`, `current_doc`, `advance_past`),
//! - the location cursor over the current posting (`loc_current`, `loc_advance`,
//!   `loc_advance_past`),
//! - [`IopNode::current_posting`] for the tf and positions of the current document.

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::store::{DocId, InvertedList, Posting, PostingStore};

/// Kinds of proximity operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProximityKind {
    /// Ordered: each argument follows the previous one within the distance.
    Near,
    /// Unordered: all arguments fall in a span narrower than the distance.
    Window,
}

impl ProximityKind {
    /// Operator name in query text.
    pub fn name(&self) -> &'static str {
        match self {
            ProximityKind::Near => "#near",
            ProximityKind::Window => "#window",
        }
    }
}

#[derive(Debug)]
enum IopSource {
    Term {
        term: String,
    },
    Proximity {
        kind: ProximityKind,
        distance: u32,
        args: Vec<IopNode>,
    },
}

/// A query node that evaluates to an inverted list.
#[derive(Debug)]
pub struct IopNode {
    field: String,
    source: IopSource,
    list: InvertedList,
    df: u64,
    ctf: u64,
    doc_index: usize,
    loc_index: usize,
}

impl IopNode {
    /// Create a term leaf.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        let field = field.into();
        IopNode {
            list: InvertedList::new(field.clone()),
            field,
            source: IopSource::Term { term: term.into() },
            df: 0,
            ctf: 0,
            doc_index: 0,
            loc_index: 0,
        }
    }

    /// Create a proximity operator over its arguments.
    ///
    /// The distance must be at least 1 and every argument must search the same
    /// field.
    pub fn proximity(kind: ProximityKind, distance: u32, args: Vec<IopNode>) -> Result<Self> {
        if distance < 1 {
            return Err(PilumError::configuration(format!(
                "{}/{distance}: distance must be at least 1",
                kind.name()
            )));
        }

        let field = args.first().map(|arg| arg.field.clone()).unwrap_or_default();
        if let Some(other) = args.iter().find(|arg| arg.field != field) {
            return Err(PilumError::configuration(format!(
                "{} arguments must share a field, found {} and {}",
                kind.name(),
                field,
                other.field
            )));
        }

        Ok(IopNode {
            list: InvertedList::new(field.clone()),
            field,
            source: IopSource::Proximity {
                kind,
                distance,
                args,
            },
            df: 0,
            ctf: 0,
            doc_index: 0,
            loc_index: 0,
        })
    }

    /// Evaluate the node, reading postings from the store.
    pub fn initialize(&mut self, store: &dyn PostingStore) -> Result<()> {
        match &mut self.source {
            IopSource::Term { term } => {
                self.list = store.postings(&self.field, term)?;
                self.df = store.document_frequency(&self.field, term)?;
                self.ctf = store.total_term_freq(&self.field, term)?;
            }
            IopSource::Proximity {
                kind,
                distance,
                args,
            } => {
                for arg in args.iter_mut() {
                    arg.initialize(store)?;
                }
                self.list = evaluate_proximity(*kind, *distance, args, &self.field)?;
                self.df = self.list.df();
                self.ctf = self.list.ctf();
            }
        }

        self.doc_index = 0;
        self.loc_index = 0;
        Ok(())
    }

    /// The field this node searches.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Document frequency of the term or proximity expression.
    pub fn df(&self) -> u64 {
        self.df
    }

    /// Collection term frequency of the term or proximity expression.
    pub fn ctf(&self) -> u64 {
        self.ctf
    }

    /// The evaluated inverted list.
    pub fn inverted_list(&self) -> &InvertedList {
        &self.list
    }

    /// Whether the document cursor sits on a posting.
    pub fn has_match(&self) -> bool {
        self.doc_index < self.list.len()
    }

    /// The document under the cursor.
    pub fn current_doc(&self) -> Option<DocId> {
        self.current_posting().map(|posting| posting.doc_id)
    }

    /// The posting under the cursor.
    pub fn current_posting(&self) -> Option<&Posting> {
        self.list.get(self.doc_index)
    }

    /// Move the document cursor to the first document after `doc_id`.
    pub fn advance_past(&mut self, doc_id: DocId) {
        let start = self.doc_index;
        while self
            .list
            .get(self.doc_index)
            .is_some_and(|posting| posting.doc_id <= doc_id)
        {
            self.doc_index += 1;
        }
        if self.doc_index != start {
            self.loc_index = 0;
        }
    }

    /// Whether the location cursor sits on a position of the current posting.
    pub fn loc_has_match(&self) -> bool {
        self.loc_current().is_some()
    }

    /// The position under the location cursor.
    pub fn loc_current(&self) -> Option<u32> {
        self.current_posting()
            .and_then(|posting| posting.positions.get(self.loc_index).copied())
    }

    /// Move the location cursor to the next position.
    pub fn loc_advance(&mut self) {
        self.loc_index += 1;
    }

    /// Move the location cursor to the first position after `position`.
    pub fn loc_advance_past(&mut self, position: u32) {
        while self.loc_current().is_some_and(|current| current <= position) {
            self.loc_index += 1;
        }
    }
}

/// Position every argument on the same document and return it, or `None` once any
/// argument is exhausted.
fn align_documents(args: &mut [IopNode]) -> Option<DocId> {
    loop {
        let mut target = 0;
        for arg in args.iter() {
            target = target.max(arg.current_doc()?);
        }

        let mut aligned = true;
        for arg in args.iter_mut() {
            if arg.current_doc()? < target {
                arg.advance_past(target - 1);
                aligned = false;
            }
        }
        if aligned {
            return Some(target);
        }
    }
}

fn evaluate_proximity(
    kind: ProximityKind,
    distance: u32,
    args: &mut [IopNode],
    field: &str,
) -> Result<InvertedList> {
    let mut list = InvertedList::new(field);
    if args.len() < 2 {
        return Ok(list);
    }

    while let Some(doc_id) = align_documents(args) {
        let positions = match kind {
            ProximityKind::Near => near_positions(args, distance),
            ProximityKind::Window => window_positions(args, distance),
        };
        list.append_posting(doc_id, positions)?;

        for arg in args.iter_mut() {
            arg.advance_past(doc_id);
        }
    }

    log::debug!(
        "{}/{distance} over {} arguments matched {} documents",
        kind.name(),
        args.len(),
        list.len()
    );
    Ok(list)
}

/// Ordered matches in the current document: each argument must occur after the
/// previous one, at most `distance` positions later. Emits the last argument's
/// position.
fn near_positions(args: &mut [IopNode], distance: u32) -> Vec<u32> {
    let mut positions = Vec::new();

    'document: while let Some(first) = args[0].loc_current() {
        let mut previous = first;
        let mut matched = true;

        for arg in args[1..].iter_mut() {
            arg.loc_advance_past(previous);
            let Some(current) = arg.loc_current() else {
                break 'document;
            };
            if current - previous > distance {
                matched = false;
                break;
            }
            previous = current;
        }

        if matched {
            positions.push(previous);
            for arg in args.iter_mut() {
                arg.loc_advance();
            }
        } else {
            args[0].loc_advance();
        }
    }

    positions
}

/// Unordered matches in the current document: all arguments within a span
/// narrower than `distance`. Emits the largest position of the span.
fn window_positions(args: &mut [IopNode], distance: u32) -> Vec<u32> {
    let mut positions = Vec::new();

    loop {
        let mut min: Option<(usize, u32)> = None;
        let mut max = 0;
        for (index, arg) in args.iter().enumerate() {
            let Some(location) = arg.loc_current() else {
                return positions;
            };
            if min.is_none_or(|(_, smallest)| location < smallest) {
                min = Some((index, location));
            }
            max = max.max(location);
        }

        let Some((min_index, min_location)) = min else {
            return positions;
        };
        if max - min_location < distance {
            positions.push(max);
            for arg in args.iter_mut() {
                arg.loc_advance();
            }
        } else {
            args[min_index].loc_advance();
        }
    }
}
