use std::fmt;

/// A closed, ordered set of stages for one kind of interaction.
///
/// `ORDER` is the canonical sequence; the last entry is terminal. `index` must
/// return the position of `self` in `ORDER` (the `stages!` macro guarantees
/// this for fieldless enums).
pub trait Stage: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const ORDER: &'static [Self];

    fn index(self) -> usize;

    fn name(self) -> &'static str;

    /// The only stage this one may lawfully advance to.
    fn successor(self) -> Option<Self> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    fn is_terminal(self) -> bool {
        self.successor().is_none()
    }

    fn first() -> Option<Self> {
        Self::ORDER.first().copied()
    }

    fn terminal() -> Option<Self> {
        Self::ORDER.last().copied()
    }
}

/// True when every stage reports its own position in `ORDER`.
pub fn order_is_consistent<S: Stage>() -> bool {
    S::ORDER
        .iter()
        .enumerate()
        .all(|(position, stage)| stage.index() == position)
}

/// Declare a stage enum and its `Stage` impl in one go.
///
/// ```
/// navicue_engine::stages! {
///     pub enum Ritual {
///         Arrival => "arrival",
///         Active => "active",
///         Afterglow => "afterglow",
///     }
/// }
///
/// use navicue_engine::lifecycle::Stage;
/// assert_eq!(Ritual::Arrival.successor(), Some(Ritual::Active));
/// assert!(Ritual::Afterglow.is_terminal());
/// ```
#[macro_export]
macro_rules! stages {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::lifecycle::Stage for $name {
            const ORDER: &'static [Self] = &[$($name::$variant),+];

            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}
