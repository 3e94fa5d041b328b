//! Fluent single-predicate value selection.
//!
//! A [`Select`] samples an input, tests it against one comparison and yields
//! one of two outputs. It holds no mutable state: every builder call
//! consumes the selector and returns a new one, and [`Select::get`] may be
//! called any number of times.
//!
//! ```
//! use deferrable::Select;
//!
//! let lod = Select::when_value(120u32)
//!     .greater_than(100)
//!     .then("low")
//!     .otherwise("high");
//! assert_eq!(lod.get(), Some("low"));
//! ```

use std::fmt;

type Supplier<T> = Box<dyn Fn() -> T>;
type Test<I> = Box<dyn Fn(&I) -> bool>;

/// A comparison over a sampled input choosing between two outputs.
///
/// A branch that was never given an output yields `None`.
pub struct Select<I, O> {
    input: Supplier<I>,
    test: Test<I>,
    then: Option<Supplier<O>>,
    otherwise: Option<Supplier<O>>,
}

impl<O: 'static> Select<(), O> {
    /// Selector whose test always passes.
    pub fn always() -> Self {
        Select::when(|| ())
    }
}

impl<I: 'static, O: 'static> Select<I, O> {
    /// Sample `input` on every `get`. The test defaults to always passing.
    pub fn when(input: impl Fn() -> I + 'static) -> Self {
        Self {
            input: Box::new(input),
            test: Box::new(|_: &I| true),
            then: None,
            otherwise: None,
        }
    }

    /// Use a fixed input.
    pub fn when_value(value: I) -> Self
    where
        I: Clone,
    {
        Self::when(move || value.clone())
    }

    fn with_test(self, test: impl Fn(&I) -> bool + 'static) -> Self {
        Self {
            test: Box::new(test),
            ..self
        }
    }

    pub fn equals(self, other: I) -> Self
    where
        I: PartialEq,
    {
        self.with_test(move |input| *input == other)
    }

    pub fn equals_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialEq,
    {
        self.with_test(move |input| *input == other())
    }

    pub fn not_equals(self, other: I) -> Self
    where
        I: PartialEq,
    {
        self.with_test(move |input| *input != other)
    }

    pub fn not_equals_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialEq,
    {
        self.with_test(move |input| *input != other())
    }

    pub fn greater_than(self, other: I) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input > other)
    }

    pub fn greater_than_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input > other())
    }

    pub fn at_least(self, other: I) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input >= other)
    }

    pub fn at_least_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input >= other())
    }

    pub fn less_than(self, other: I) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input < other)
    }

    pub fn less_than_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input < other())
    }

    pub fn at_most(self, other: I) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input <= other)
    }

    pub fn at_most_with(self, other: impl Fn() -> I + 'static) -> Self
    where
        I: PartialOrd,
    {
        self.with_test(move |input| *input <= other())
    }

    /// Output when the test passes.
    pub fn then(self, value: O) -> Self
    where
        O: Clone,
    {
        self.then_with(move || value.clone())
    }

    pub fn then_with(self, output: impl Fn() -> O + 'static) -> Self {
        Self {
            then: Some(Box::new(output)),
            ..self
        }
    }

    /// Output when the test fails.
    pub fn otherwise(self, value: O) -> Self
    where
        O: Clone,
    {
        self.otherwise_with(move || value.clone())
    }

    pub fn otherwise_with(self, output: impl Fn() -> O + 'static) -> Self {
        Self {
            otherwise: Some(Box::new(output)),
            ..self
        }
    }

    /// Sample the input, run the test and produce the chosen output.
    pub fn get(&self) -> Option<O> {
        let branch = if (self.test)(&(self.input)()) {
            &self.then
        } else {
            &self.otherwise
        };
        branch.as_ref().map(|output| output())
    }
}

impl<I, O> fmt::Debug for Select<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Select")
            .field("then", &self.then.is_some())
            .field("otherwise", &self.otherwise.is_some())
            .finish_non_exhaustive()
    }
}
