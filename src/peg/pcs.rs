//! Possible-opening-character-set (PCS) computation, used by `Choice` and
//! `InOrder` to skip alternatives that cannot match the current code unit
//! (§4.B, "first-character prune").

use smallvec::SmallVec;

/// A set of code units a rule might start matching on, or `Unknown` when no
/// useful shortcut can be computed (e.g. a predicate `CharClass`, or any
/// rule reachable through a `NotAssert`).
#[derive(Debug, Clone)]
pub enum Pcs {
    Unknown,
    Set(SmallVec<[u16; 8]>),
}

impl Pcs {
    pub fn empty() -> Self {
        Pcs::Set(SmallVec::new())
    }

    pub fn single(unit: u16) -> Self {
        let mut s = SmallVec::new();
        s.push(unit);
        Pcs::Set(s)
    }

    pub fn contains(&self, unit: u16) -> bool {
        match self {
            Pcs::Unknown => true,
            Pcs::Set(set) => set.contains(&unit),
        }
    }

    pub fn union(self, other: Pcs) -> Pcs {
        match (self, other) {
            (Pcs::Unknown, _) | (_, Pcs::Unknown) => Pcs::Unknown,
            (Pcs::Set(mut a), Pcs::Set(b)) => {
                for u in b {
                    if !a.contains(&u) {
                        a.push(u);
                    }
                }
                Pcs::Set(a)
            }
        }
    }

    pub fn intersect(self, other: Pcs) -> Pcs {
        match (self, other) {
            (Pcs::Unknown, p) | (p, Pcs::Unknown) => p,
            (Pcs::Set(a), Pcs::Set(b)) => {
                Pcs::Set(a.into_iter().filter(|u| b.contains(u)).collect())
            }
        }
    }

    pub fn subtract(self, other: Pcs) -> Pcs {
        match (self, other) {
            (Pcs::Unknown, _) => Pcs::Unknown,
            (p, Pcs::Unknown) => p,
            (Pcs::Set(a), Pcs::Set(b)) => {
                Pcs::Set(a.into_iter().filter(|u| !b.contains(u)).collect())
            }
        }
    }
}

/// The matchable units for `CharClass`. `Units` enumerates a small explicit
/// set (enabling PCS computation); `Predicate` accepts an arbitrary
/// function but is opaque to PCS analysis (`Pcs::Unknown`).
#[derive(Clone)]
pub enum CharSet {
    Units(SmallVec<[u16; 16]>),
    Predicate(std::sync::Arc<dyn Fn(u16) -> bool + Send + Sync>),
}

impl CharSet {
    pub fn from_units(units: impl IntoIterator<Item = u16>) -> Self {
        CharSet::Units(units.into_iter().collect())
    }

    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Self {
        CharSet::Units(
            chars
                .into_iter()
                .flat_map(|c| {
                    let mut buf = [0u16; 2];
                    c.encode_utf16(&mut buf).to_vec()
                })
                .collect(),
        )
    }

    pub fn predicate(f: impl Fn(u16) -> bool + Send + Sync + 'static) -> Self {
        CharSet::Predicate(std::sync::Arc::new(f))
    }

    pub fn contains(&self, unit: u16) -> bool {
        match self {
            CharSet::Units(units) => units.contains(&unit),
            CharSet::Predicate(f) => f(unit),
        }
    }

    pub fn pcs(&self) -> Pcs {
        match self {
            CharSet::Units(units) => Pcs::Set(units.clone()),
            CharSet::Predicate(_) => Pcs::Unknown,
        }
    }
}

impl std::fmt::Debug for CharSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharSet::Units(units) => f.debug_tuple("Units").field(units).finish(),
            CharSet::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
