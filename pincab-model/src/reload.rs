// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

/// The category of work a settings change triggers once persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadType {
    None,
    Font,
    Windows,
    Assets,
    Tables,
    Audio,
    Overlay,
    Title,
}

impl ReloadType {
    fn bit(self) -> u8 {
        match self {
            ReloadType::None => 0,
            ReloadType::Font => 1 << 0,
            ReloadType::Title => 1 << 1,
            ReloadType::Windows => 1 << 2,
            ReloadType::Assets => 1 << 3,
            ReloadType::Tables => 1 << 4,
            ReloadType::Audio => 1 << 5,
            ReloadType::Overlay => 1 << 6,
        }
    }
}

/// Effects must be dispatched in this order: fonts first so title textures
/// regenerate with the new metrics, windows before assets so renderers exist
/// when textures are rebound, assets before tables so the per-table loader
/// can use them, audio last because it depends on no earlier state.
pub const DISPATCH_ORDER: [ReloadType; 7] = [
    ReloadType::Font,
    ReloadType::Title,
    ReloadType::Windows,
    ReloadType::Assets,
    ReloadType::Tables,
    ReloadType::Audio,
    ReloadType::Overlay,
];

/// A set of pending reload effects, as computed from a settings diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSet(u8);

impl ReloadSet {
    pub fn insert(&mut self, effect: ReloadType) {
        self.0 |= effect.bit();
    }

    pub fn contains(&self, effect: ReloadType) -> bool {
        effect != ReloadType::None && self.0 & effect.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The contained effects, in dispatch order.
    pub fn in_order(&self) -> impl Iterator<Item = ReloadType> + '_ {
        DISPATCH_ORDER.into_iter().filter(|e| self.contains(*e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn none_is_never_contained() {
        let mut set = ReloadSet::default();
        set.insert(ReloadType::None);
        assert!(set.is_empty());
        assert!(!set.contains(ReloadType::None));
    }

    #[test]
    fn iterates_in_dispatch_order() {
        let mut set = ReloadSet::default();
        set.insert(ReloadType::Audio);
        set.insert(ReloadType::Font);
        set.insert(ReloadType::Windows);

        let order: Vec<_> = set.in_order().collect();
        assert_eq!(
            order,
            vec![ReloadType::Font, ReloadType::Windows, ReloadType::Audio]
        );
    }
}
