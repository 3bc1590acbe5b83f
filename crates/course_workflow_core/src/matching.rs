//! crates/course_workflow_core/src/matching.rs
//!
//! Re-associates batched generation results with the inputs they were produced from.
//!
//! Each output is matched by the index the capability echoed back, then by exact
//! title, then by position. Title and position matching are a known weak spot: a
//! model that paraphrases titles *and* reorders its output will be paired by
//! position with the wrong input. Every input is claimed at most once.

/// How an output found its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    SourceIndex,
    Title,
    Position,
}

/// Result of pairing a batch of outputs with its inputs.
#[derive(Debug)]
pub struct Association<O> {
    /// `(input index, output, how)` in output order.
    pub pairs: Vec<(usize, O, MatchedBy)>,
    /// Outputs that could not be paired with any unclaimed input.
    pub unmatched: usize,
}

impl<O> Association<O> {
    pub fn fell_back(&self) -> usize {
        self.pairs
            .iter()
            .filter(|(_, _, how)| *how != MatchedBy::SourceIndex)
            .count()
    }
}

/// Pairs `outputs` with `input_titles`.
///
/// `key` yields the echoed source index (if any) and the title the output claims
/// to belong to.
pub fn associate<O>(
    input_titles: &[&str],
    outputs: Vec<O>,
    key: impl Fn(&O) -> (Option<usize>, String),
) -> Association<O> {
    let mut claimed = vec![false; input_titles.len()];
    let mut pairs = Vec::with_capacity(outputs.len());
    let mut unmatched = 0;

    for (position, output) in outputs.into_iter().enumerate() {
        let (source_index, title) = key(&output);

        let by_index = source_index
            .filter(|&i| i < input_titles.len() && !claimed[i])
            .map(|i| (i, MatchedBy::SourceIndex));
        let by_title = || {
            (0..input_titles.len())
                .find(|&i| !claimed[i] && input_titles[i] == title)
                .map(|i| (i, MatchedBy::Title))
        };
        let by_position = || {
            (position < input_titles.len() && !claimed[position])
                .then_some((position, MatchedBy::Position))
        };

        match by_index.or_else(by_title).or_else(by_position) {
            Some((i, how)) => {
                claimed[i] = true;
                pairs.push((i, output, how));
            }
            None => unmatched += 1,
        }
    }

    Association { pairs, unmatched }
}
