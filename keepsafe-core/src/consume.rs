//! Typed sinks for streaming multi-row reads.
//!
//! Stores push rows into a [`Consumer`] one at a time and stop as soon as the
//! consumer reports it cannot take more, so callers decide whether to
//! materialize, filter or stream a result set.

use std::marker::PhantomData;

/// Receives values one at a time.
pub trait Consumer<T> {
    /// Whether `consume` may be called again.
    fn can_consume(&self) -> bool;

    /// Take one value. Only called while `can_consume` returns true.
    fn consume(&mut self, value: T);
}

impl<T> Consumer<T> for Vec<T> {
    fn can_consume(&self) -> bool {
        true
    }

    fn consume(&mut self, value: T) {
        self.push(value);
    }
}

impl<T, C: Consumer<T> + ?Sized> Consumer<T> for &mut C {
    fn can_consume(&self) -> bool {
        (**self).can_consume()
    }

    fn consume(&mut self, value: T) {
        (**self).consume(value);
    }
}

/// Forwards only the values matching a predicate.
pub struct Filter<C, F> {
    consumer: C,
    predicate: F,
}

impl<T, C, F> Consumer<T> for Filter<C, F>
where
    C: Consumer<T>,
    F: FnMut(&T) -> bool,
{
    fn can_consume(&self) -> bool {
        self.consumer.can_consume()
    }

    fn consume(&mut self, value: T) {
        if (self.predicate)(&value) {
            self.consumer.consume(value);
        }
    }
}

/// Wrap `consumer` so it only receives values for which `predicate` is true.
pub fn filter<T, C, F>(consumer: C, predicate: F) -> Filter<C, F>
where
    C: Consumer<T>,
    F: FnMut(&T) -> bool,
{
    Filter {
        consumer,
        predicate,
    }
}

/// Converts values and forwards the ones that map to `Some`.
pub struct MapFilter<C, F, U> {
    consumer: C,
    mapper: F,
    _output: PhantomData<fn() -> U>,
}

impl<T, U, C, F> Consumer<T> for MapFilter<C, F, U>
where
    C: Consumer<U>,
    F: FnMut(T) -> Option<U>,
{
    fn can_consume(&self) -> bool {
        self.consumer.can_consume()
    }

    fn consume(&mut self, value: T) {
        if let Some(mapped) = (self.mapper)(value) {
            self.consumer.consume(mapped);
        }
    }
}

/// Wrap `consumer` so it receives `mapper(value)` whenever that is `Some`.
pub fn map_filter<T, U, C, F>(consumer: C, mapper: F) -> MapFilter<C, F, U>
where
    C: Consumer<U>,
    F: FnMut(T) -> Option<U>,
{
    MapFilter {
        consumer,
        mapper,
        _output: PhantomData,
    }
}

/// Adapts a closure into a consumer that never stops.
pub struct ConsumerFn<F>(pub F);

impl<T, F: FnMut(T)> Consumer<T> for ConsumerFn<F> {
    fn can_consume(&self) -> bool {
        true
    }

    fn consume(&mut self, value: T) {
        (self.0)(value);
    }
}

/// Stops after `limit` values.
pub struct Take<C> {
    consumer: C,
    remaining: usize,
}

impl<T, C: Consumer<T>> Consumer<T> for Take<C> {
    fn can_consume(&self) -> bool {
        self.remaining > 0 && self.consumer.can_consume()
    }

    fn consume(&mut self, value: T) {
        self.remaining = self.remaining.saturating_sub(1);
        self.consumer.consume(value);
    }
}

/// Wrap `consumer` so it accepts at most `limit` values.
pub fn take<C>(consumer: C, limit: usize) -> Take<C> {
    Take {
        consumer,
        remaining: limit,
    }
}

/// Feed `values` to `consumer` until it is full.
pub fn feed<T, C, I>(consumer: &mut C, values: I)
where
    C: Consumer<T> + ?Sized,
    I: IntoIterator<Item = T>,
{
    for value in values {
        if !consumer.can_consume() {
            break;
        }
        consumer.consume(value);
    }
}
