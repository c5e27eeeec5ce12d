//! Concurrent fan-out of one operation across many targets.
//!
//! Every target gets its own unit of work and all units run to completion; a failing unit never
//! cancels its siblings. Errors are collected into an `ErrorList` which keeps every one of them.

use std::fmt;
use std::future::Future;

use futures::future::join_all;

/// An aggregate of errors from a fan-out, displayed one per line.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<anyhow::Error>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: anyhow::Error) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, anyhow::Error> {
        self.0.iter()
    }

    /// Return `Ok` if no errors were collected.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no errors"),
            [err] => write!(f, "{:#}", err),
            errs => {
                write!(f, "{} errors occurred:", errs.len())?;
                for err in errs {
                    write!(f, "\n  * {:#}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorList {}

impl IntoIterator for ErrorList {
    type Item = anyhow::Error;
    type IntoIter = std::vec::IntoIter<anyhow::Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<anyhow::Error> for ErrorList {
    fn extend<I: IntoIterator<Item = anyhow::Error>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

/// The per-target outcome of a fan-out.
#[derive(Debug)]
pub struct FanOut<T, R> {
    /// Targets whose operation succeeded, along with their output.
    pub successes: Vec<(T, R)>,
    /// Every error returned by a failed operation.
    pub errors: ErrorList,
}

/// Run `op` concurrently for every target and collect every outcome.
pub async fn collect_concurrently<T, R, F, Fut>(targets: impl IntoIterator<Item = T>, op: F) -> FanOut<T, R>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let units = targets.into_iter().map(|target| {
        let fut = op(target.clone());
        async move { (target, fut.await) }
    });
    let mut outcome = FanOut {
        successes: Vec::new(),
        errors: ErrorList::new(),
    };
    for (target, res) in join_all(units).await {
        match res {
            Ok(val) => outcome.successes.push((target, val)),
            Err(err) => outcome.errors.push(err),
        }
    }
    outcome
}

/// Run `op` concurrently for every target, returning every error if any unit failed.
pub async fn run_concurrently<T, F, Fut>(targets: impl IntoIterator<Item = T>, op: F) -> Result<(), ErrorList>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut errors = ErrorList::new();
    errors.extend(join_all(targets.into_iter().map(op)).await.into_iter().filter_map(Result::err));
    errors.into_result()
}
