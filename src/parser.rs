//! Pipeline parsing: grouping tokens into stages, extracting redirection
//! operators and the trailing background marker.

use std::path::PathBuf;

/// One command and its arguments within a pipeline.
///
/// Index 0 is the program name. Stages are never empty after parsing; a
/// stage that would come out empty (stray pipe operators) is dropped.
pub type Stage = Vec<String>;

/// Boundary redirections for a whole pipeline.
///
/// `input` is attached to the first stage's standard input and `output`
/// to the last stage's standard output; `append` selects append versus
/// truncate semantics for `output`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub append: bool,
}

/// A fully parsed input line: an ordered chain of stages to connect by
/// pipes, the boundary redirections, and whether to detach the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    pub stages: Vec<Stage>,
    pub redirections: Redirections,
    pub background: bool,
}

/// Parse a token sequence into a [`PipelineSpec`].
///
/// Returns `None` when no stage survives parsing (a blank line, or a line
/// consisting solely of operators), which the caller treats as a no-op.
pub fn parse_line(mut tokens: Vec<String>) -> Option<PipelineSpec> {
    let background = tokens.last().map(String::as_str) == Some("&");
    if background {
        tokens.pop();
    }

    let mut stages = split_on_pipe(tokens);
    if stages.is_empty() {
        return None;
    }

    let (first, redirections) = extract_redirections(stages.remove(0));
    if first.is_empty() {
        // The first stage was nothing but redirection operators; the whole
        // line is absorbed as a parse anomaly.
        return None;
    }
    stages.insert(0, first);

    Some(PipelineSpec {
        stages,
        redirections,
        background,
    })
}

/// Split a token sequence into stages at `|` tokens.
///
/// Consecutive, leading or trailing pipes would produce empty stages;
/// those are silently absorbed rather than reported, so the result holds
/// exactly the maximal non-empty runs of non-pipe tokens.
pub fn split_on_pipe(tokens: Vec<String>) -> Vec<Stage> {
    let mut stages = Vec::new();
    let mut current = Stage::new();
    for token in tokens {
        if token == "|" {
            if !current.is_empty() {
                stages.push(std::mem::take(&mut current));
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        stages.push(current);
    }
    stages
}

/// Remove `<`, `>` and `>>` operator/filename pairs from a stage.
///
/// Later occurrences overwrite earlier ones. An operator as the last
/// token, with no operand following it, is ignored as if absent. Only the
/// first stage of a pipeline is scanned; the extracted files apply to the
/// pipeline's boundary streams regardless of where the stage sits.
pub fn extract_redirections(stage: Stage) -> (Stage, Redirections) {
    let mut redirections = Redirections::default();
    let mut kept = Stage::with_capacity(stage.len());
    let mut tokens = stage.into_iter();
    while let Some(token) = tokens.next() {
        match token.as_str() {
            "<" => {
                if let Some(name) = tokens.next() {
                    redirections.input = Some(PathBuf::from(name));
                }
            }
            ">" => {
                if let Some(name) = tokens.next() {
                    redirections.output = Some(PathBuf::from(name));
                    redirections.append = false;
                }
            }
            ">>" => {
                if let Some(name) = tokens.next() {
                    redirections.output = Some(PathBuf::from(name));
                    redirections.append = true;
                }
            }
            _ => kept.push(token),
        }
    }
    (kept, redirections)
}
