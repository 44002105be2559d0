use serde_json::{json, Value};
use std::cmp::Ordering;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use super::errors::ApplyError;
use super::host::{CombatHost, HostExport, TargetRef};
use super::value_objects::{Combatant, CursorStep, Effect, Field, TurnPosition};

// ============================================================================
// Combat Tracker - In-memory CombatHost adapter
// ============================================================================
//
// Holds the encounter the bridge exports and mutates:
// - combatants kept in initiative order (highest first, unrolled last)
// - a turn cursor (round, turn index) that wraps into the next round
// - per-combatant hp and named conditions
//
// ============================================================================

#[derive(Debug, Default)]
struct CombatState {
    combat_id: Option<String>,
    started: bool,
    round: u32,
    turn: usize,
    combatants: Vec<Combatant>,
}

impl CombatState {
    fn find_mut(&mut self, target: &TargetRef) -> Result<&mut Combatant, ApplyError> {
        self.combatants
            .iter_mut()
            .find(|c| c.token_id == target.as_str())
            .ok_or_else(|| ApplyError::TargetNotFound(target.as_str().to_string()))
    }

    fn active_token(&self) -> Option<String> {
        if !self.started {
            return None;
        }
        self.combatants.get(self.turn).map(|c| c.token_id.clone())
    }

    /// Re-sort by initiative while keeping the cursor on the same combatant.
    fn sort_turn_order(&mut self) {
        let active = self.active_token();
        self.combatants.sort_by(|a, b| match (a.initiative, b.initiative) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        if let Some(token) = active {
            if let Some(idx) = self.combatants.iter().position(|c| c.token_id == token) {
                self.turn = idx;
            }
        }
    }
}

pub struct CombatTracker {
    world: String,
    state: RwLock<CombatState>,
}

impl CombatTracker {
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            state: RwLock::new(CombatState::default()),
        }
    }

    pub fn with_combatant(self, combatant: Combatant) -> Self {
        self.add_combatant(combatant);
        self
    }

    pub fn add_combatant(&self, combatant: Combatant) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.combatants.push(combatant);
        state.sort_turn_order();
    }

    /// Begin the encounter at round 1 on the first combatant in order.
    pub fn start_combat(&self) -> Result<TurnPosition, ApplyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.combatants.is_empty() {
            return Err(ApplyError::NoCombatants);
        }
        state.combat_id = Some(format!("combat-{}", Uuid::new_v4().simple()));
        state.started = true;
        state.round = 1;
        state.turn = 0;
        Ok(TurnPosition { round: 1, turn: 0 })
    }

    pub fn combatant(&self, target: &str) -> Option<Combatant> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .combatants
            .iter()
            .find(|c| c.token_id == target || c.actor_id.as_deref() == Some(target))
            .cloned()
    }

    pub fn position(&self) -> TurnPosition {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        TurnPosition { round: state.round, turn: state.turn }
    }
}

fn combatant_json(c: &Combatant) -> Value {
    json!({
        "tokenId": c.token_id,
        "actorId": c.actor_id,
        "name": c.name,
        "initiative": c.initiative,
        "hp": { "value": c.hp, "max": c.max_hp, "temp": c.temp_hp },
        "effects": c.effects,
    })
}

impl CombatHost for CombatTracker {
    fn resolve(&self, target: &str) -> Option<TargetRef> {
        self.combatant(target).map(|c| TargetRef::new(c.token_id))
    }

    fn read_field(&self, target: &TargetRef, field: Field) -> Option<f64> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let combatant = state.combatants.iter().find(|c| c.token_id == target.as_str())?;
        match field {
            Field::Hp => combatant.hp.map(|v| v as f64),
            Field::MaxHp => combatant.max_hp.map(|v| v as f64),
            Field::TempHp => combatant.temp_hp.map(|v| v as f64),
            Field::Initiative => combatant.initiative,
        }
    }

    fn write_field(&self, target: &TargetRef, field: Field, value: f64) -> Result<(), ApplyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let combatant = state.find_mut(target)?;
        let whole = value.round() as i64;

        match field {
            Field::Hp => {
                let ceiling = combatant.max_hp.unwrap_or(i64::MAX);
                combatant.hp = Some(whole.clamp(0, ceiling.max(0)));
            }
            Field::MaxHp => {
                let max = whole.max(0);
                combatant.max_hp = Some(max);
                if let Some(hp) = combatant.hp {
                    combatant.hp = Some(hp.min(max));
                }
            }
            Field::TempHp => combatant.temp_hp = Some(whole.max(0)),
            Field::Initiative => {
                combatant.initiative = Some(value);
                state.sort_turn_order();
            }
        }
        Ok(())
    }

    fn step_cursor(&self, step: CursorStep) -> Result<TurnPosition, ApplyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let len = state.combatants.len();
        if len == 0 {
            return Err(ApplyError::NoCombatants);
        }

        match step {
            CursorStep::Forward if !state.started => {
                state.started = true;
                state.round = 1;
                state.turn = 0;
                if state.combat_id.is_none() {
                    state.combat_id = Some(format!("combat-{}", Uuid::new_v4().simple()));
                }
            }
            CursorStep::Forward => {
                if state.turn + 1 >= len {
                    state.turn = 0;
                    state.round += 1;
                } else {
                    state.turn += 1;
                }
            }
            CursorStep::Back => {
                if !state.started || (state.round <= 1 && state.turn == 0) {
                    return Err(ApplyError::CursorAtStart);
                }
                if state.turn == 0 {
                    state.round -= 1;
                    state.turn = len - 1;
                } else {
                    state.turn -= 1;
                }
            }
        }

        Ok(TurnPosition { round: state.round, turn: state.turn })
    }

    fn set_condition(
        &self,
        target: &TargetRef,
        condition: &str,
        active: Option<bool>,
    ) -> Result<bool, ApplyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let combatant = state.find_mut(target)?;
        let present = combatant.has_condition(condition);
        let wanted = active.unwrap_or(!present);

        if wanted && !present {
            combatant.effects.push(Effect::condition(condition));
        } else if !wanted && present {
            let label = condition.trim();
            combatant.effects.retain(|e| !e.label.eq_ignore_ascii_case(label));
        }
        Ok(wanted)
    }

    fn export(&self) -> HostExport {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let active = state.started || state.round > 0;
        let active_combatant = if state.started {
            state.combatants.get(state.turn).map(|c| {
                json!({
                    "tokenId": c.token_id,
                    "actorId": c.actor_id,
                    "name": c.name,
                    "initiative": c.initiative,
                })
            })
        } else {
            None
        };

        let payload = json!({
            "source": "foundry",
            "world": self.world,
            "combat": {
                "active": active,
                "id": state.combat_id,
                "round": state.round,
                "turn": state.turn,
                "activeCombatant": active_combatant,
            },
            "combatants": state.combatants.iter().map(combatant_json).collect::<Vec<_>>(),
        });

        HostExport { active, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> CombatTracker {
        CombatTracker::new("Test World")
            .with_combatant(Combatant::new("t-goblin", "Goblin").with_actor("a-goblin").with_hp(7, 7).with_initiative(12.0))
            .with_combatant(Combatant::new("t-hero", "Hero").with_hp(20, 24).with_initiative(18.0))
            .with_combatant(Combatant::new("t-ogre", "Ogre").with_hp(59, 59))
    }

    #[test]
    fn test_combatants_sorted_by_initiative() {
        let tracker = tracker();
        let export = tracker.export();
        let names: Vec<&str> = export.payload["combatants"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Hero", "Goblin", "Ogre"]);
    }

    #[test]
    fn test_resolve_by_actor_id() {
        let tracker = tracker();
        assert_eq!(tracker.resolve("a-goblin"), Some(TargetRef::new("t-goblin")));
        assert_eq!(tracker.resolve("missing"), None);
    }

    #[test]
    fn test_hp_clamped_to_bounds() {
        let tracker = tracker();
        let hero = TargetRef::new("t-hero");

        tracker.write_field(&hero, Field::Hp, 99.0).unwrap();
        assert_eq!(tracker.read_field(&hero, Field::Hp), Some(24.0));

        tracker.write_field(&hero, Field::Hp, -5.0).unwrap();
        assert_eq!(tracker.read_field(&hero, Field::Hp), Some(0.0));
    }

    #[test]
    fn test_write_to_unknown_target_fails() {
        let tracker = tracker();
        let result = tracker.write_field(&TargetRef::new("ghost"), Field::Hp, 1.0);
        assert_eq!(result, Err(ApplyError::TargetNotFound("ghost".to_string())));
    }

    #[test]
    fn test_cursor_wraps_into_next_round() {
        let tracker = tracker();
        assert_eq!(tracker.step_cursor(CursorStep::Forward).unwrap(), TurnPosition { round: 1, turn: 0 });
        tracker.step_cursor(CursorStep::Forward).unwrap();
        tracker.step_cursor(CursorStep::Forward).unwrap();
        assert_eq!(tracker.step_cursor(CursorStep::Forward).unwrap(), TurnPosition { round: 2, turn: 0 });
        assert_eq!(tracker.step_cursor(CursorStep::Back).unwrap(), TurnPosition { round: 1, turn: 2 });
    }

    #[test]
    fn test_cursor_cannot_rewind_past_start() {
        let tracker = tracker();
        assert_eq!(tracker.step_cursor(CursorStep::Back), Err(ApplyError::CursorAtStart));
        tracker.start_combat().unwrap();
        assert_eq!(tracker.step_cursor(CursorStep::Back), Err(ApplyError::CursorAtStart));
    }

    #[test]
    fn test_initiative_change_keeps_active_combatant() {
        let tracker = tracker();
        tracker.start_combat().unwrap();
        tracker.step_cursor(CursorStep::Forward).unwrap(); // Goblin's turn

        tracker.write_field(&TargetRef::new("t-ogre"), Field::Initiative, 25.0).unwrap();

        let export = tracker.export();
        assert_eq!(export.payload["combat"]["activeCombatant"]["name"], "Goblin");
        assert_eq!(export.payload["combatants"][0]["name"], "Ogre");
    }

    #[test]
    fn test_condition_toggle_and_force() {
        let tracker = tracker();
        let goblin = TargetRef::new("t-goblin");

        assert!(tracker.set_condition(&goblin, "Prone", None).unwrap());
        assert!(!tracker.set_condition(&goblin, "prone", None).unwrap());
        assert!(!tracker.set_condition(&goblin, "Prone", Some(false)).unwrap());
        assert!(tracker.set_condition(&goblin, "Prone", Some(true)).unwrap());
        assert!(tracker.set_condition(&goblin, "Prone", Some(true)).unwrap());

        let goblin = tracker.combatant("t-goblin").unwrap();
        assert_eq!(goblin.effects.len(), 1);
    }

    #[test]
    fn test_export_shape_before_combat() {
        let tracker = tracker();
        let export = tracker.export();
        assert!(!export.active);
        assert_eq!(export.payload["source"], "foundry");
        assert_eq!(export.payload["world"], "Test World");
        assert!(export.payload["combat"]["activeCombatant"].is_null());
        assert_eq!(export.payload["combatants"][0]["hp"]["max"], 24);
    }
}
