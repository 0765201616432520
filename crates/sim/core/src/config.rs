use crate::time::SimTime;

/// Engine constants and tunable parameters shared by every unit in a simulation.
///
/// Percent-valued fields use percentage points (`5.0` means 5%).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Global cooldown triggered by abilities that do not override it.
    pub default_gcd: SimTime,
    /// Haste can never push a global cooldown below this.
    pub min_gcd: SimTime,

    /// Damage multiplier of a critical melee or ranged hit.
    pub physical_crit_multiplier: f64,
    /// Damage multiplier of a critical spell hit or heal.
    pub spell_crit_multiplier: f64,

    /// Melee/ranged miss chance against an equal-level defender.
    pub physical_miss_base: f64,
    /// Additional physical miss chance per level the defender is above the attacker.
    pub physical_miss_per_level: f64,
    /// Spell miss chance indexed by level difference (0, 1, 2, 3+).
    pub spell_miss_by_level_diff: [f64; 4],
    /// Additional dodge chance per level the defender is above the attacker.
    pub dodge_per_level: f64,
    /// Crit chance removed per level the defender is above the attacker.
    pub crit_suppression_per_level: f64,
    /// Armor constant `K` in `armor / (armor + K + 85 * attacker_level)`.
    pub armor_constant: f64,
    /// Damage reduction from armor is capped at this fraction.
    pub armor_cap: f64,

    /// Mana regenerated per second per point of Spirit.
    pub mana_per_spirit_per_sec: f64,
    pub energy_regen_per_sec: f64,
    pub focus_regen_per_sec: f64,
    /// Rage lost per second while above zero.
    pub rage_decay_per_sec: f64,
    pub max_energy: f64,
    pub max_rage: f64,
    pub max_focus: f64,

    /// Upper bound on auras a single unit may register.
    pub max_auras_per_unit: usize,
}

impl SimConfig {
    // ===== compile-time constants =====
    pub const MAX_UNITS: usize = 64;
    pub const MAX_LEVEL_DIFF_INDEX: usize = 3;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_GCD: SimTime = SimTime::from_millis(1500);
    pub const DEFAULT_MIN_GCD: SimTime = SimTime::from_millis(1000);

    pub fn new() -> Self {
        Self {
            default_gcd: Self::DEFAULT_GCD,
            min_gcd: Self::DEFAULT_MIN_GCD,
            physical_crit_multiplier: 2.0,
            spell_crit_multiplier: 1.5,
            physical_miss_base: 5.0,
            physical_miss_per_level: 1.0,
            spell_miss_by_level_diff: [4.0, 5.0, 6.0, 17.0],
            dodge_per_level: 0.5,
            crit_suppression_per_level: 1.0,
            armor_constant: 400.0,
            armor_cap: 0.75,
            mana_per_spirit_per_sec: 0.2,
            energy_regen_per_sec: 10.0,
            focus_regen_per_sec: 5.0,
            rage_decay_per_sec: 1.0,
            max_energy: 100.0,
            max_rage: 100.0,
            max_focus: 100.0,
            max_auras_per_unit: 128,
        }
    }

    /// Spell miss chance for a defender `level_diff` levels above the attacker.
    pub fn spell_miss(&self, level_diff: i32) -> f64 {
        let idx = level_diff.clamp(0, Self::MAX_LEVEL_DIFF_INDEX as i32) as usize;
        self.spell_miss_by_level_diff[idx]
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}
