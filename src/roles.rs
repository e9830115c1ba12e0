//! Roles: ordered option lists with a semantic kind.
//!
//! Priority is list order — index 0 is the highest. The default catalog
//! carries one role per kind; hybrid roles appended at runtime get fresh
//! catalog indices.

use serde::{Deserialize, Serialize};

use crate::behaviors::Behavior;
use crate::options::OptionDef;
use crate::world::ResourceKind;

/// Semantic role families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Gatherer,
    Builder,
    Fighter,
    /// Driven entirely by the host command queue.
    Scripted,
}

/// An ordered option list plus its kind.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub kind: RoleKind,
    pub options: Vec<OptionDef>,
}

/// All roles the controller can assign. Index = role id.
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Vec<Role>,
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self {
            roles: vec![
                gatherer_role(),
                builder_role(),
                fighter_role(),
                scripted_role(),
            ],
        }
    }
}

impl RoleCatalog {
    pub fn get(&self, id: usize) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Append a role (hybrid generation) and return its id.
    pub fn push(&mut self, role: Role) -> usize {
        self.roles.push(role);
        self.roles.len() - 1
    }

    /// Default role id for an agent's slot within its team.
    ///
    /// A team of six fields two gatherers, two builders and two fighters;
    /// other team sizes split into thirds the same way.
    pub fn default_for_slot(&self, slot: u32, team_size: u32) -> usize {
        let third = team_size.max(3).div_ceil(3);
        match (slot % team_size.max(1)) / third {
            0 => 0, // Gatherer
            1 => 1, // Builder
            _ => 2, // Fighter
        }
    }
}

fn gatherer_role() -> Role {
    Role {
        name: "gatherer".to_string(),
        kind: RoleKind::Gatherer,
        options: vec![
            OptionDef::new("flee_danger", Behavior::FleeDanger, true),
            OptionDef::new("deposit", Behavior::DepositCarry, true),
            OptionDef::new("harvest_wood", Behavior::Harvest(ResourceKind::Wood), true),
            OptionDef::new("harvest_food", Behavior::Harvest(ResourceKind::Food), true),
            OptionDef::new("harvest_stone", Behavior::Harvest(ResourceKind::Stone), true),
            OptionDef::new("harvest_gold", Behavior::Harvest(ResourceKind::Gold), true),
            OptionDef::new("plant_sapling", Behavior::PlantSapling, false),
            OptionDef::new("explore", Behavior::Explore, true),
        ],
    }
}

fn builder_role() -> Role {
    Role {
        name: "builder".to_string(),
        kind: RoleKind::Builder,
        options: vec![
            OptionDef::new("flee_danger", Behavior::FleeDanger, true),
            OptionDef::new("construct", Behavior::EnsureBuildings, false),
            OptionDef::new("light_area", Behavior::PlaceLantern, true),
            OptionDef::new("explore", Behavior::Explore, true),
        ],
    }
}

fn fighter_role() -> Role {
    Role {
        name: "fighter".to_string(),
        kind: RoleKind::Fighter,
        options: vec![
            OptionDef::new("hunt_threats", Behavior::HuntThreats, true),
            OptionDef::new("explore", Behavior::Explore, true),
        ],
    }
}

fn scripted_role() -> Role {
    Role {
        name: "scripted".to_string(),
        kind: RoleKind::Scripted,
        options: vec![OptionDef::new(
            "run_commands",
            Behavior::RunCommandQueue,
            false,
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_shape() {
        let catalog = RoleCatalog::default();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.get(0).unwrap().kind, RoleKind::Gatherer);
        assert_eq!(catalog.get(3).unwrap().kind, RoleKind::Scripted);
        assert!(catalog.get(99).is_none());
    }

    #[test]
    fn test_slot_defaults_team_of_six() {
        let catalog = RoleCatalog::default();
        let kinds: Vec<RoleKind> = (0..6)
            .map(|slot| catalog.get(catalog.default_for_slot(slot, 6)).unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                RoleKind::Gatherer,
                RoleKind::Gatherer,
                RoleKind::Builder,
                RoleKind::Builder,
                RoleKind::Fighter,
                RoleKind::Fighter,
            ]
        );
    }

    #[test]
    fn test_hybrid_role_appends() {
        let mut catalog = RoleCatalog::default();
        let id = catalog.push(Role {
            name: "warden".to_string(),
            kind: RoleKind::Fighter,
            options: vec![OptionDef::new("explore", Behavior::Explore, true)],
        });
        assert_eq!(id, 4);
        assert_eq!(catalog.get(id).unwrap().name, "warden");
    }

    #[test]
    fn test_priority_order_flee_first() {
        let catalog = RoleCatalog::default();
        let gatherer = catalog.get(0).unwrap();
        assert_eq!(gatherer.options[0].name, "flee_danger");
        assert!(gatherer.options[0].interruptible);
    }
}
