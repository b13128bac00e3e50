//! Progress reporting for long-running operations.

/// Receives periodic progress updates.
///
/// `start` and `end` bound the destination rows being produced and
/// `current` is the row up to which output is complete. Updates are
/// informational; an abort flag raised from here is only honoured by the
/// caller between operations.
///
/// Any `FnMut(i32, i32, i32)` closure implements this trait:
///
/// ```rust
/// use rastile_ops::Progress;
///
/// let mut last = 0;
/// let mut report = |_start: i32, _end: i32, current: i32| last = current;
/// report.update(0, 100, 42);
/// assert_eq!(last, 42);
/// ```
pub trait Progress {
    /// Reports that rows `start..current` of `start..end` are done.
    fn update(&mut self, start: i32, end: i32, current: i32);
}

impl<F> Progress for F
where
    F: FnMut(i32, i32, i32),
{
    #[inline]
    fn update(&mut self, start: i32, end: i32, current: i32) {
        self(start, end, current)
    }
}
