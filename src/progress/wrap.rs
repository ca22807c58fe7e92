use super::engine::ProgressEngine;

/// Iterator adapter reporting progress as items are consumed.
///
/// The max value is the iterator's length. The engine starts when the first
/// item is requested; before each further item the number of items already
/// yielded is reported, and exhausting the iterator reports the length, which
/// finishes the line. Dropping the adapter early stops the engine. An empty
/// iterator never starts it.
///
/// ```rust,no_run
/// for file in tickline::progress::wrap(vec!["a.txt", "b.txt", "c.txt"]) {
///     println!("{file}");
/// }
/// ```
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Wrap<I> {
    engine: ProgressEngine,
    iter: I,
    len: usize,
    yielded: usize,
    started: bool,
    finished: bool,
}

impl<I: ExactSizeIterator> Wrap<I> {
    pub(crate) fn new(engine: ProgressEngine, iter: I) -> Self {
        let len = iter.len();
        Self {
            engine,
            iter,
            len,
            yielded: 0,
            started: false,
            finished: false,
        }
    }

    pub fn engine(&self) -> &ProgressEngine {
        &self.engine
    }

    fn begin(&mut self) {
        self.started = true;
        if self.len == 0 {
            return;
        }
        if let Err(err) = self.engine.set_max(self.len as f64) {
            log::warn!("tickline: cannot wrap iterator: {err}");
            return;
        }
        self.engine.start();
    }

    fn end(&mut self) {
        self.finished = true;
        if self.len > 0 {
            self.engine.report(self.len as f64);
        }
        self.engine.stop();
    }
}

impl<I: ExactSizeIterator> Iterator for Wrap<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.finished {
            return None;
        }
        if self.started {
            self.engine.report(self.yielded as f64);
        } else {
            self.begin();
        }
        match self.iter.next() {
            Some(item) => {
                self.yielded += 1;
                Some(item)
            }
            None => {
                self.end();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<I: ExactSizeIterator> ExactSizeIterator for Wrap<I> {}

impl<I> Drop for Wrap<I> {
    fn drop(&mut self) {
        if self.started && !self.finished {
            self.engine.stop();
        }
    }
}
