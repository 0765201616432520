/// Per-unit multipliers that are not part of the stat vector.
///
/// Captured alongside `initial` stats at finalize and restored on reset.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PseudoStats {
    /// Divides cast times and global cooldowns.
    pub cast_speed_multiplier: f64,
    /// Divides melee and ranged attack intervals.
    pub attack_speed_multiplier: f64,
    pub damage_dealt_multiplier: f64,
    pub damage_taken_multiplier: f64,
    pub healing_dealt_multiplier: f64,
    /// Scales every resource cost paid by the unit.
    pub cost_multiplier: f64,
    pub threat_multiplier: f64,
    /// Added to the critical damage bonus: `1 + (base - 1) * (1 + crit_damage_bonus)`.
    pub crit_damage_bonus: f64,
}

impl PseudoStats {
    pub const fn new() -> Self {
        Self {
            cast_speed_multiplier: 1.0,
            attack_speed_multiplier: 1.0,
            damage_dealt_multiplier: 1.0,
            damage_taken_multiplier: 1.0,
            healing_dealt_multiplier: 1.0,
            cost_multiplier: 1.0,
            threat_multiplier: 1.0,
            crit_damage_bonus: 0.0,
        }
    }

    pub fn get(&self, which: PseudoStat) -> f64 {
        match which {
            PseudoStat::CastSpeed => self.cast_speed_multiplier,
            PseudoStat::AttackSpeed => self.attack_speed_multiplier,
            PseudoStat::DamageDealt => self.damage_dealt_multiplier,
            PseudoStat::DamageTaken => self.damage_taken_multiplier,
            PseudoStat::HealingDealt => self.healing_dealt_multiplier,
            PseudoStat::Cost => self.cost_multiplier,
            PseudoStat::Threat => self.threat_multiplier,
            PseudoStat::CritDamageBonus => self.crit_damage_bonus,
        }
    }

    pub fn get_mut(&mut self, which: PseudoStat) -> &mut f64 {
        match which {
            PseudoStat::CastSpeed => &mut self.cast_speed_multiplier,
            PseudoStat::AttackSpeed => &mut self.attack_speed_multiplier,
            PseudoStat::DamageDealt => &mut self.damage_dealt_multiplier,
            PseudoStat::DamageTaken => &mut self.damage_taken_multiplier,
            PseudoStat::HealingDealt => &mut self.healing_dealt_multiplier,
            PseudoStat::Cost => &mut self.cost_multiplier,
            PseudoStat::Threat => &mut self.threat_multiplier,
            PseudoStat::CritDamageBonus => &mut self.crit_damage_bonus,
        }
    }
}

impl Default for PseudoStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Selector for a single [`PseudoStats`] field, used by multiplier auras.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PseudoStat {
    CastSpeed,
    AttackSpeed,
    DamageDealt,
    DamageTaken,
    HealingDealt,
    Cost,
    Threat,
    CritDamageBonus,
}
