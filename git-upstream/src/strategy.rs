//! Strategy (spec §4.5): thin composition of a Searcher and a filter list.

use std::cell::OnceCell;

use crate::commit::Commit;
use crate::filter::{
    DiscardDuplicateGerritChangeId, DroppedCommitFilter, Filter, FilterChain, NoMergeCommitFilter,
    ReverseCommitFilter, SupersededCommitFilter,
};
use crate::git::GitError;
use crate::searcher::Searcher;

pub struct Strategy {
    searcher: Searcher,
    upstream: String,
    raw: OnceCell<Vec<Commit>>,
    previous_upstream_cell: OnceCell<String>,
}

impl Strategy {
    /// Builds the production `drop` strategy: the searcher over
    /// `search_refs` (with `upstream` always prepended), and the five
    /// filters in the fixed order spec §4.4 requires.
    pub fn drop_strategy(branch: impl Into<String>, upstream: impl Into<String>, mut search_refs: Vec<String>) -> Self {
        let upstream = upstream.into();
        if !search_refs.contains(&upstream) {
            search_refs.insert(0, upstream.clone());
        }
        let searcher = Searcher::new(branch.into(), search_refs, true);
        Strategy {
            searcher,
            upstream,
            raw: OnceCell::new(),
            previous_upstream_cell: OnceCell::new(),
        }
    }

    /// The searcher's located previous-import commit, computed lazily and
    /// cached for the lifetime of the strategy.
    pub fn previous_upstream(&self) -> Result<&str, GitError> {
        if let Some(v) = self.previous_upstream_cell.get() {
            return Ok(v);
        }
        let found = self.searcher.find()?;
        Ok(self.previous_upstream_cell.get_or_init(|| found))
    }

    fn raw_list(&self) -> Result<&[Commit], GitError> {
        if let Some(v) = self.raw.get() {
            return Ok(v);
        }
        let previous = self.previous_upstream()?.to_string();
        let commits = self.searcher.list(&previous, Some(&self.upstream))?;
        Ok(self.raw.get_or_init(|| commits))
    }

    pub fn len(&self) -> Result<usize, GitError> {
        Ok(self.raw_list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, GitError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<Option<&Commit>, GitError> {
        Ok(self.raw_list()?.get(index))
    }

    /// Runs the raw carried-commit list through the drop strategy's filter
    /// chain, in the order spec §4.4 specifies.
    pub fn filtered_list(&self) -> Result<Vec<Commit>, GitError> {
        let previous = self.previous_upstream()?.to_string();
        let raw = self.raw_list()?.to_vec();

        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(DiscardDuplicateGerritChangeId {
                search_ref: self.upstream.clone(),
                limit: previous.clone(),
            }),
            Box::new(NoMergeCommitFilter),
            Box::new(ReverseCommitFilter),
            Box::new(DroppedCommitFilter::default()),
            Box::new(SupersededCommitFilter::new(self.upstream.clone(), previous)),
        ];
        let chain = FilterChain::new(filters);
        Ok(chain.apply(Box::new(raw.into_iter()))?.collect())
    }
}
