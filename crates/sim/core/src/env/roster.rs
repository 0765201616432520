use crate::ids::UnitId;

/// Role a unit plays in an encounter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitKind {
    Player,
    /// Pet, guardian or summon fighting for `owner`.
    Companion { owner: UnitId },
    Opponent,
}

impl UnitKind {
    pub const fn is_opponent(&self) -> bool {
        matches!(self, Self::Opponent)
    }
}

/// Group membership of every unit in a simulation.
///
/// Players and their companions form one side, opponents the other.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    kinds: Vec<UnitKind>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, kind: UnitKind) -> UnitId {
        let id = UnitId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, unit: UnitId) -> Option<UnitKind> {
        self.kinds.get(unit.index()).copied()
    }

    /// The owning unit of a companion; `None` for everyone else.
    pub fn owner_of(&self, unit: UnitId) -> Option<UnitId> {
        match self.kind(unit)? {
            UnitKind::Companion { owner } => Some(owner),
            _ => None,
        }
    }

    pub fn companions_of(&self, owner: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.ids().filter(move |&id| self.owner_of(id) == Some(owner))
    }

    pub fn opponents_of(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        let side = self.kind(unit).map(|k| k.is_opponent());
        self.ids()
            .filter(move |&id| side.is_some() && self.kind(id).map(|k| k.is_opponent()) != side)
    }

    /// Units on the same side as `unit`, excluding `unit` itself.
    pub fn allies_of(&self, unit: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        let side = self.kind(unit).map(|k| k.is_opponent());
        self.ids()
            .filter(move |&id| id != unit && side.is_some() && self.kind(id).map(|k| k.is_opponent()) == side)
    }

    fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        (0..self.kinds.len() as u32).map(UnitId)
    }
}
