/// Entity model and ownership registry
///
/// Entities are the host-side domain objects scripts can create, clone, cast and
/// destroy. The class hierarchy is closed, so it is modelled as a tagged kind with a
/// precomputed ancestry mask: `is_a` is one bit test no matter how deep the tree.
///
/// Every entity handed to a script lives in the `EntityRegistry` under an `EntityId`
/// and carries an ownership tag. Ownership only changes through explicit calls
/// (`adopt`, `destroy`, `surrender`, `reclaim`); the script's garbage collector never
/// frees anything on its own.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use tracing::{debug, warn};

/// Every entity class exposed to scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Entity,
    SceneObject,
    MovableObject,
    MOSprite,
    MOSRotating,
    MOPixel,
    MOSParticle,
    Attachable,
    AEmitter,
    Turret,
    HeldDevice,
    HDFirearm,
    ThrownDevice,
    TDExplosive,
    Magazine,
    Actor,
    ADoor,
    AHuman,
    ACrab,
    ACraft,
    ACDropShip,
    ACRocket,
    TerrainObject,
    Round,
    Scene,
}

struct KindInfo {
    name: &'static str,
    parent: Option<EntityKind>,
    concrete: bool,
}

const fn info(name: &'static str, parent: Option<EntityKind>, concrete: bool) -> KindInfo {
    KindInfo {
        name,
        parent,
        concrete,
    }
}

/// Indexed by `EntityKind as usize`; order must match the enum
const KIND_INFO: [KindInfo; EntityKind::COUNT] = {
    type K = EntityKind;
    [
        info("Entity", None, false),
        info("SceneObject", Some(K::Entity), false),
        info("MovableObject", Some(K::SceneObject), false),
        info("MOSprite", Some(K::MovableObject), false),
        info("MOSRotating", Some(K::MOSprite), true),
        info("MOPixel", Some(K::MovableObject), true),
        info("MOSParticle", Some(K::MOSprite), true),
        info("Attachable", Some(K::MOSRotating), true),
        info("AEmitter", Some(K::Attachable), true),
        info("Turret", Some(K::Attachable), true),
        info("HeldDevice", Some(K::Attachable), true),
        info("HDFirearm", Some(K::HeldDevice), true),
        info("ThrownDevice", Some(K::HeldDevice), true),
        info("TDExplosive", Some(K::ThrownDevice), true),
        info("Magazine", Some(K::Attachable), true),
        info("Actor", Some(K::MOSRotating), true),
        info("ADoor", Some(K::Actor), true),
        info("AHuman", Some(K::Actor), true),
        info("ACrab", Some(K::Actor), true),
        info("ACraft", Some(K::Actor), true),
        info("ACDropShip", Some(K::ACraft), true),
        info("ACRocket", Some(K::ACraft), true),
        info("TerrainObject", Some(K::SceneObject), true),
        info("Round", Some(K::Entity), true),
        info("Scene", Some(K::Entity), true),
    ]
};

const fn ancestry_mask(kind: EntityKind) -> u32 {
    let mut mask = 0u32;
    let mut current = Some(kind);
    while let Some(k) = current {
        mask |= 1 << (k as u32);
        current = KIND_INFO[k as usize].parent;
    }
    mask
}

/// Bit `b` of `ANCESTRY[k]` is set when kind `k` is-a kind `b`
const ANCESTRY: [u32; EntityKind::COUNT] = {
    let mut masks = [0u32; EntityKind::COUNT];
    let mut i = 0;
    while i < EntityKind::COUNT {
        masks[i] = ancestry_mask(EntityKind::ALL[i]);
        i += 1;
    }
    masks
};

impl EntityKind {
    pub const COUNT: usize = 25;

    /// All kinds, root first, in registration order
    pub const ALL: [EntityKind; EntityKind::COUNT] = {
        type K = EntityKind;
        [
            K::Entity, K::SceneObject, K::MovableObject, K::MOSprite, K::MOSRotating,
            K::MOPixel, K::MOSParticle, K::Attachable, K::AEmitter, K::Turret, K::HeldDevice,
            K::HDFirearm, K::ThrownDevice, K::TDExplosive, K::Magazine, K::Actor, K::ADoor,
            K::AHuman, K::ACrab, K::ACraft, K::ACDropShip, K::ACRocket, K::TerrainObject,
            K::Round, K::Scene,
        ]
    };

    /// Class name as seen by scripts and preset files
    pub fn name(self) -> &'static str {
        KIND_INFO[self as usize].name
    }

    pub fn parent(self) -> Option<EntityKind> {
        KIND_INFO[self as usize].parent
    }

    /// Whether presets of exactly this kind can be instantiated
    pub fn is_concrete(self) -> bool {
        KIND_INFO[self as usize].concrete
    }

    /// Runtime kind test: true if `self` is `other` or derives from it
    pub fn is_a(self, other: EntityKind) -> bool {
        ANCESTRY[self as usize] & (1 << (other as u32)) != 0
    }

    pub fn from_name(name: &str) -> Option<EntityKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host domain object
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub preset_name: String,
    /// Name of the data module that defined the preset
    pub module: String,
    pub description: String,
    pub groups: BTreeSet<String>,
    pub buyable: bool,
    pub number_values: BTreeMap<String, f64>,
    pub string_values: BTreeMap<String, String>,
}

impl Entity {
    pub fn new(kind: EntityKind, preset_name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            kind,
            preset_name: preset_name.into(),
            module: module.into(),
            description: String::new(),
            groups: BTreeSet::new(),
            buyable: true,
            number_values: BTreeMap::new(),
            string_values: BTreeMap::new(),
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        group == "Any" || self.groups.contains(group)
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Handle to a registry slot, stable for the lifetime of the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who is responsible for releasing an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Host keeps ownership; scripts only borrow the handle
    Host,
    /// Script adopted the entity and must delete or submit it
    Script,
}

struct Slot {
    entity: Entity,
    owner: Owner,
}

/// Owning store for every entity reachable from scripts
pub struct EntityRegistry {
    slots: HashMap<EntityId, Slot>,
    next_id: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, entity: Entity, owner: Owner) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        debug!(entity = %id, class = entity.kind.name(), preset = %entity.preset_name, ?owner, "Registered entity");
        self.slots.insert(id, Slot { entity, owner });
        id
    }

    /// Store an entity created on behalf of a script; the script becomes its owner
    pub fn adopt(&mut self, entity: Entity) -> EntityId {
        self.insert(entity, Owner::Script)
    }

    /// Expose a host-owned entity to scripts without transferring ownership
    pub fn lend(&mut self, entity: Entity) -> EntityId {
        self.insert(entity, Owner::Host)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(&id).map(|slot| &slot.entity)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots.get_mut(&id).map(|slot| &mut slot.entity)
    }

    pub fn owner(&self, id: EntityId) -> Option<Owner> {
        self.slots.get(&id).map(|slot| slot.owner)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Free a script-owned entity
    ///
    /// Host-owned entities are left untouched and handed back in the error.
    pub fn destroy(&mut self, id: EntityId) -> Result<Entity, Option<Owner>> {
        match self.slots.get(&id).map(|slot| slot.owner) {
            Some(Owner::Script) => {
                let slot = self.slots.remove(&id).ok_or(None)?;
                debug!(entity = %id, "Destroyed script-owned entity");
                Ok(slot.entity)
            }
            other => Err(other),
        }
    }

    /// Transfer a script-owned entity to the host, which becomes responsible for it
    ///
    /// Returns false if the id is unknown or already host-owned.
    pub fn surrender(&mut self, id: EntityId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if slot.owner == Owner::Script => {
                slot.owner = Owner::Host;
                true
            }
            _ => false,
        }
    }

    /// Take an entity out of the registry regardless of owner
    ///
    /// Any handle scripts still hold becomes dangling and fails soft.
    pub fn reclaim(&mut self, id: EntityId) -> Option<Entity> {
        self.slots.remove(&id).map(|slot| slot.entity)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn script_owned_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.owner == Owner::Script)
            .count()
    }

    /// Drop every script-owned entity, warning about each one
    ///
    /// Returns how many were released.
    pub fn release_leaked(&mut self) -> usize {
        let leaked: Vec<EntityId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.owner == Owner::Script)
            .map(|(id, _)| *id)
            .collect();
        for id in &leaked {
            if let Some(slot) = self.slots.remove(id) {
                warn!(
                    entity = %id,
                    class = slot.entity.kind.name(),
                    preset = %slot.entity.preset_name,
                    "Script-owned entity was never deleted or submitted"
                );
            }
        }
        leaked.len()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_table_matches_enum_order() {
        for (index, kind) in EntityKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, index);
            assert_eq!(EntityKind::from_name(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn test_is_a_follows_hierarchy() {
        assert!(EntityKind::AHuman.is_a(EntityKind::Actor));
        assert!(EntityKind::AHuman.is_a(EntityKind::MovableObject));
        assert!(EntityKind::AHuman.is_a(EntityKind::Entity));
        assert!(EntityKind::TDExplosive.is_a(EntityKind::HeldDevice));
        assert!(EntityKind::ACRocket.is_a(EntityKind::ACraft));
        assert!(!EntityKind::Actor.is_a(EntityKind::AHuman));
        assert!(!EntityKind::HDFirearm.is_a(EntityKind::Actor));
        assert!(!EntityKind::Scene.is_a(EntityKind::SceneObject));
    }

    #[test]
    fn test_every_kind_descends_from_entity() {
        for kind in EntityKind::ALL {
            assert!(kind.is_a(EntityKind::Entity));
            assert!(kind.is_a(kind));
        }
    }

    #[test]
    fn test_abstract_kinds() {
        assert!(!EntityKind::Entity.is_concrete());
        assert!(!EntityKind::MOSprite.is_concrete());
        assert!(EntityKind::ACraft.is_concrete());
        assert!(EntityKind::ACDropShip.is_concrete());
    }

    #[test]
    fn test_destroy_only_frees_script_owned() {
        let mut registry = EntityRegistry::new();
        let owned = registry.adopt(Entity::new(EntityKind::AHuman, "Soldier", "Base.rte"));
        let borrowed = registry.lend(Entity::new(EntityKind::Scene, "Map", "Base.rte"));

        assert!(registry.destroy(owned).is_ok());
        assert!(!registry.contains(owned));
        assert_eq!(registry.destroy(borrowed).unwrap_err(), Some(Owner::Host));
        assert!(registry.contains(borrowed));
        assert_eq!(registry.destroy(owned).unwrap_err(), None);
    }

    #[test]
    fn test_surrender_moves_ownership_to_host() {
        let mut registry = EntityRegistry::new();
        let id = registry.adopt(Entity::new(EntityKind::HDFirearm, "SMG", "Base.rte"));
        assert!(registry.surrender(id));
        assert_eq!(registry.owner(id), Some(Owner::Host));
        assert!(!registry.surrender(id));
        assert!(registry.destroy(id).is_err());
        assert!(registry.reclaim(id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_leaked() {
        let mut registry = EntityRegistry::new();
        registry.adopt(Entity::new(EntityKind::Actor, "A", "Base.rte"));
        registry.adopt(Entity::new(EntityKind::Actor, "B", "Base.rte"));
        registry.lend(Entity::new(EntityKind::Scene, "Map", "Base.rte"));
        assert_eq!(registry.script_owned_count(), 2);
        assert_eq!(registry.release_leaked(), 2);
        assert_eq!(registry.len(), 1);
    }
}
