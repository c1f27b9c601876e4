//! Script host
//!
//! The state every runtime adapter binds against: the entity registry, the preset
//! lookup, the file channel table and the console output queue. Bindings call the
//! operations here and convert results to script values; all diagnostics are
//! produced here so every runtime reports the same messages.
//!
//! Everything runs on the main tick, so interior mutability is `RefCell` based and
//! the host is shared with `Rc`. No borrow is held across a call back into a script.

use std::cell::{Cell, Ref, RefCell, RefMut};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::api::console::ConsoleApi;
use crate::api::entity::{Entity, EntityId, EntityKind, EntityRegistry, Owner};
use crate::api::file::{ChannelError, FileChannelTable, OpenError};
use crate::api::path_security::PathSecurityConfig;
use crate::api::presets::{ModuleRef, PresetLookup};
use crate::config::ScriptConfig;

/// Shared state behind all script bindings
pub struct ScriptHost {
    config: ScriptConfig,
    presets: Box<dyn PresetLookup>,
    entities: RefCell<EntityRegistry>,
    files: RefCell<FileChannelTable>,
    console: RefCell<ConsoleApi>,
    temp_entities: RefCell<Vec<EntityId>>,
    submitted: RefCell<Vec<EntityId>>,
    rng: RefCell<StdRng>,
    next_preset_id: Cell<u32>,
    next_object_id: Cell<u32>,
}

impl ScriptHost {
    /// Create the host
    ///
    /// # Arguments
    /// * `config` - Scripting configuration (data dir, limits)
    /// * `presets` - Preset source used by `Create*` and `Random*`
    /// * `runtime_type` - Runtime name used in log fields
    pub fn new(config: ScriptConfig, presets: impl PresetLookup + 'static, runtime_type: &'static str) -> Self {
        let security = PathSecurityConfig::new(config.working_dir().clone(), config.module_suffix())
            .with_known_modules(presets.module_names());
        let files = FileChannelTable::new(config.max_open_files(), security, config.max_line_length());
        let rng = match config.rng_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            presets: Box::new(presets),
            entities: RefCell::new(EntityRegistry::new()),
            files: RefCell::new(files),
            console: RefCell::new(ConsoleApi::new(runtime_type)),
            temp_entities: RefCell::new(Vec::new()),
            submitted: RefCell::new(Vec::new()),
            rng: RefCell::new(rng),
            next_preset_id: Cell::new(0),
            next_object_id: Cell::new(0),
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn presets(&self) -> &dyn PresetLookup {
        self.presets.as_ref()
    }

    pub fn entities(&self) -> Ref<'_, EntityRegistry> {
        self.entities.borrow()
    }

    pub fn entities_mut(&self) -> RefMut<'_, EntityRegistry> {
        self.entities.borrow_mut()
    }

    pub fn console(&self) -> RefMut<'_, ConsoleApi> {
        self.console.borrow_mut()
    }

    pub fn files(&self) -> RefMut<'_, FileChannelTable> {
        self.files.borrow_mut()
    }

    /// Report a recovered error to the console
    pub fn report_error(&self, message: &str) {
        self.console.borrow_mut().error(message);
    }

    /// Report a bridge call that received a value of the wrong type
    pub fn report_bad_argument(&self, function: &str, expected: &str, got: &str) {
        self.report_error(&format!("{} expected {}, got {}!", function, expected, got));
    }

    // ------------------------------------------------------------------
    // Entity bridge
    // ------------------------------------------------------------------

    /// Clone the named preset and hand ownership to the script
    pub fn create(&self, kind: EntityKind, preset_name: &str, module: &str) -> Option<EntityId> {
        let module_ref = ModuleRef::from_name(module);
        let Some(preset) = self.presets.find_preset(kind, preset_name, module_ref) else {
            let module = if module.is_empty() { "All" } else { module };
            self.report_error(&format!(
                "There is no {} of the Preset name \"{}\" defined in the \"{}\" Data Module!",
                kind, preset_name, module
            ));
            return None;
        };
        let instance = preset.clone();
        Some(self.entities.borrow_mut().adopt(instance))
    }

    /// Clone a random buyable preset from a group and hand ownership to the script
    ///
    /// Falls back to the same group in the base module, then to any group in the
    /// requested module.
    pub fn random(&self, kind: EntityKind, group: &str, module: ModuleRef<'_>) -> Option<EntityId> {
        let base = self
            .presets
            .module_id(self.config.base_module())
            .map(ModuleRef::Id);

        let attempts = [Some((group, module)), base.map(|b| (group, b)), Some(("Any", module))];
        for (group, module) in attempts.into_iter().flatten() {
            let candidates = self.presets.buyable_in_group(kind, group, module);
            let picked = candidates.choose(&mut *self.rng.borrow_mut()).map(|p| (*p).clone());
            if let Some(instance) = picked {
                return Some(self.entities.borrow_mut().adopt(instance));
            }
        }

        let module_name = match module {
            ModuleRef::All => "All".to_string(),
            ModuleRef::Name(name) => name.to_string(),
            ModuleRef::Id(id) => self
                .presets
                .module_name(id)
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string()),
        };
        self.report_error(&format!(
            "Could not find any {} defined in a Group called \"{}\" in module {}!",
            kind, group, module_name
        ));
        None
    }

    /// Resolve a handle, reporting nil and dangling handles
    fn live_entity(&self, kind: EntityKind, id: Option<EntityId>, action: &str) -> Option<Entity> {
        let Some(id) = id else {
            self.report_error(&format!("Tried to {} a {} reference that is nil!", action, kind));
            return None;
        };
        let entity = self.entities.borrow().get(id).cloned();
        if entity.is_none() {
            self.report_error(&format!(
                "Tried to {} a {} reference that has already been deleted!",
                action, kind
            ));
        }
        entity
    }

    /// Deep copy an entity; the copy is owned by the script
    pub fn clone_entity(&self, kind: EntityKind, id: Option<EntityId>) -> Option<EntityId> {
        let entity = self.live_entity(kind, id, "clone")?;
        if !entity.kind.is_a(kind) {
            self.report_cast_failure(kind, &entity);
            return None;
        }
        Some(self.entities.borrow_mut().adopt(entity))
    }

    /// Checked downcast; the same handle comes back on success
    pub fn cast(&self, kind: EntityKind, id: Option<EntityId>) -> Option<EntityId> {
        let entity = self.live_entity(kind, id, "convert")?;
        if entity.kind.is_a(kind) {
            id
        } else {
            self.report_cast_failure(kind, &entity);
            None
        }
    }

    fn report_cast_failure(&self, target: EntityKind, entity: &Entity) {
        self.report_error(&format!(
            "Tried to convert a non-{target} Entity reference ({} \"{}\") to a {target} reference!",
            entity.kind, entity.preset_name
        ));
    }

    /// Kind test without diagnostics
    pub fn is_kind(&self, kind: EntityKind, id: Option<EntityId>) -> bool {
        id.and_then(|id| self.entities.borrow().get(id).map(|e| e.kind.is_a(kind)))
            .unwrap_or(false)
    }

    /// Release a script-owned entity right away
    ///
    /// Host-owned entities are not touched. Deleting nil is a no-op.
    pub fn delete_entity(&self, id: Option<EntityId>) {
        let Some(id) = id else {
            return;
        };
        let result = self.entities.borrow_mut().destroy(id);
        match result {
            Ok(entity) => debug!(entity = %id, preset = %entity.preset_name, "Script deleted entity"),
            Err(Some(Owner::Host)) => self.report_error(
                "Tried to delete an entity owned by the engine; only entities created by scripts can be deleted!",
            ),
            Err(_) => self.report_error("Tried to delete an entity that has already been deleted!"),
        }
    }

    /// Hand a script-owned entity to the host
    pub fn submit_entity(&self, id: Option<EntityId>) -> bool {
        let Some(id) = id else {
            self.report_error("Tried to submit a nil entity reference!");
            return false;
        };
        if self.entities.borrow_mut().surrender(id) {
            self.submitted.borrow_mut().push(id);
            true
        } else {
            self.report_error("Tried to submit an entity the script does not own!");
            false
        }
    }

    /// Entities scripts submitted since the last call, oldest first
    pub fn take_submitted(&self) -> Vec<EntityId> {
        std::mem::take(&mut *self.submitted.borrow_mut())
    }

    /// Expose a host-owned entity to scripts
    pub fn lend_entity(&self, entity: Entity) -> EntityId {
        self.entities.borrow_mut().lend(entity)
    }

    /// Take any entity back out of the registry
    pub fn reclaim_entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.borrow_mut().reclaim(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.borrow().get(id).cloned()
    }

    /// Replace the argument batch used by the next scripted callback
    pub fn set_temp_entities(&self, ids: Vec<EntityId>) {
        *self.temp_entities.borrow_mut() = ids;
    }

    pub fn temp_entities(&self) -> Vec<EntityId> {
        self.temp_entities.borrow().clone()
    }

    pub fn new_preset_id(&self) -> String {
        let id = self.next_preset_id.get();
        self.next_preset_id.set(id + 1);
        format!("Pre{:05}", id)
    }

    pub fn new_object_id(&self) -> String {
        let id = self.next_object_id.get();
        self.next_object_id.set(id + 1);
        format!("Obj{:05}", id)
    }

    // ------------------------------------------------------------------
    // File bridge
    // ------------------------------------------------------------------

    /// Open a sandboxed file; -1 on failure
    pub fn file_open(&self, path: &str, mode: &str) -> i64 {
        let result = self.files.borrow_mut().open(path, mode);
        match result {
            Ok(handle) => handle,
            Err(OpenError::NoFreeSlot) => {
                self.report_error(&OpenError::NoFreeSlot.to_string());
                -1
            }
            Err(e) => {
                debug!(path, mode, "File open refused: {}", e);
                -1
            }
        }
    }

    pub fn file_close(&self, handle: i64) {
        self.files.borrow_mut().close(handle);
    }

    pub fn file_close_all(&self) {
        self.files.borrow_mut().close_all();
    }

    /// Next line of the file, or "" with a diagnostic at EOF / on a bad handle
    pub fn file_read_line(&self, handle: i64) -> String {
        let result = self.files.borrow_mut().read_line(handle);
        match result {
            Ok(line) => line,
            Err(ChannelError::Io(e)) => {
                self.report_error(&format!("Failed to read from file: {}", e));
                String::new()
            }
            Err(_) => {
                self.report_error("Tried to read a closed file, or read past EOF.");
                String::new()
            }
        }
    }

    pub fn file_write_line(&self, handle: i64, text: &str) {
        let result = self.files.borrow_mut().write_line(handle, text);
        match result {
            Ok(()) => {}
            Err(ChannelError::Io(e)) => self.report_error(&format!("Failed to write to file: {}", e)),
            Err(_) => self.report_error("Tried to write to a closed file."),
        }
    }

    pub fn file_eof(&self, handle: i64) -> bool {
        self.files.borrow_mut().eof(handle)
    }

    /// Close every file and free whatever scripts never released
    ///
    /// Returns the number of leaked script-owned entities.
    pub fn shutdown(&self) -> usize {
        self.files.borrow_mut().close_all();
        self.temp_entities.borrow_mut().clear();
        let leaked = self.entities.borrow_mut().release_leaked();
        info!(leaked, "Script host shut down");
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::presets::PresetRegistry;
    use std::fs;
    use tempfile::tempdir;

    fn host_with(dir: &std::path::Path) -> ScriptHost {
        let mut presets = PresetRegistry::new();
        let base = presets.add_module("Base.rte");
        let extra = presets.add_module("Extra.rte");
        presets.add_preset(
            base,
            Entity::new(EntityKind::AHuman, "Soldier Light", "").with_groups(["Actors"]),
        );
        presets.add_preset(base, Entity::new(EntityKind::HDFirearm, "SMG", "").with_groups(["Weapons"]));
        presets.add_preset(extra, Entity::new(EntityKind::ACrab, "Crab", "").with_groups(["Crabs"]));
        ScriptHost::new(ScriptConfig::new(dir).with_rng_seed(7), presets, "lua")
    }

    fn errors(host: &ScriptHost) -> Vec<String> {
        host.console()
            .take_lines()
            .into_iter()
            .filter(|l| l.starts_with("ERROR: "))
            .collect()
    }

    #[test]
    fn test_create_then_delete_leaves_registry_empty() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        let id = host.create(EntityKind::AHuman, "Soldier Light", "Base.rte");
        assert!(id.is_some());
        assert_eq!(host.entities().owner(id.unwrap()), Some(Owner::Script));
        host.delete_entity(id);
        assert!(host.entities().is_empty());
        assert!(errors(&host).is_empty());
    }

    #[test]
    fn test_create_missing_preset_reports_once() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        assert!(host.create(EntityKind::AHuman, "nonexistent", "All").is_none());
        let errors = errors(&host);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("There is no AHuman of the Preset name \"nonexistent\""));
        assert!(host.entities().is_empty());
    }

    #[test]
    fn test_random_falls_back_to_base_then_any() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());

        let id = host.random(EntityKind::Actor, "Actors", ModuleRef::Name("Extra.rte")).unwrap();
        assert_eq!(host.entity(id).unwrap().preset_name, "Soldier Light");

        let id = host.random(EntityKind::Actor, "Nonexistent", ModuleRef::Name("Extra.rte")).unwrap();
        assert_eq!(host.entity(id).unwrap().preset_name, "Crab");

        assert!(host.random(EntityKind::Turret, "Anything", ModuleRef::All).is_none());
        let errors = errors(&host);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Could not find any Turret"));
        assert!(errors[0].ends_with("in module All!"));
    }

    #[test]
    fn test_clone_and_cast() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        let soldier = host.create(EntityKind::AHuman, "Soldier Light", "All");

        let copy = host.clone_entity(EntityKind::Actor, soldier).unwrap();
        assert_ne!(Some(copy), soldier);
        assert_eq!(host.entities().len(), 2);

        assert_eq!(host.cast(EntityKind::Actor, soldier), soldier);
        assert!(host.is_kind(EntityKind::MOSRotating, soldier));
        assert!(!host.is_kind(EntityKind::HDFirearm, soldier));
        assert!(!host.is_kind(EntityKind::Actor, None));
        assert!(errors(&host).is_empty());

        assert!(host.cast(EntityKind::HDFirearm, soldier).is_none());
        assert!(host.clone_entity(EntityKind::Actor, None).is_none());
        let errors = errors(&host);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("non-HDFirearm Entity reference (AHuman \"Soldier Light\")"));
        assert!(errors[1].contains("Tried to clone a Actor reference that is nil!"));
    }

    #[test]
    fn test_deleted_handle_fails_soft() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        let soldier = host.create(EntityKind::AHuman, "Soldier Light", "All");
        host.delete_entity(soldier);
        assert!(host.cast(EntityKind::Actor, soldier).is_none());
        host.delete_entity(soldier);
        assert_eq!(errors(&host).len(), 2);
    }

    #[test]
    fn test_host_owned_entities_survive_delete() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        let scene = host.lend_entity(Entity::new(EntityKind::Scene, "Map", "Base.rte"));
        host.delete_entity(Some(scene));
        assert!(host.entity(scene).is_some());
        assert_eq!(errors(&host).len(), 1);
        assert!(host.reclaim_entity(scene).is_some());
    }

    #[test]
    fn test_submit_entity() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        let soldier = host.create(EntityKind::AHuman, "Soldier Light", "All");
        assert!(host.submit_entity(soldier));
        assert_eq!(host.take_submitted(), vec![soldier.unwrap()]);
        assert!(host.take_submitted().is_empty());
        assert!(!host.submit_entity(soldier));
        assert_eq!(host.shutdown(), 0);
    }

    #[test]
    fn test_shutdown_releases_leaks() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        host.create(EntityKind::AHuman, "Soldier Light", "All");
        host.create(EntityKind::HDFirearm, "SMG", "All");
        assert_eq!(host.shutdown(), 2);
        assert!(host.entities().is_empty());
    }

    #[test]
    fn test_new_ids_are_sequential() {
        let temp = tempdir().unwrap();
        let host = host_with(temp.path());
        assert_eq!(host.new_preset_id(), "Pre00000");
        assert_eq!(host.new_preset_id(), "Pre00001");
        assert_eq!(host.new_object_id(), "Obj00000");
    }

    #[test]
    fn test_full_file_table_reports_once() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Base.rte")).unwrap();
        let config = ScriptConfig::new(temp.path()).with_max_open_files(1);
        let host = ScriptHost::new(config, PresetRegistry::new(), "lua");

        let first = host.file_open("Base.rte/a.txt", "w");
        assert_eq!(first, 0);
        assert_eq!(host.file_open("Base.rte/b.txt", "w"), -1);
        assert_eq!(host.file_open("../b.txt", "w"), -1);
        assert_eq!(errors(&host), vec!["ERROR: Can't open file, no more slots."]);

        host.file_close(first);
        assert_eq!(host.file_open("Base.rte/b.txt", "w"), 0);
        assert!(errors(&host).is_empty());
    }

    #[test]
    fn test_craft_presets_resolve_through_ancestry() {
        let temp = tempdir().unwrap();
        let mut presets = PresetRegistry::new();
        let base = presets.add_module("Base.rte");
        presets.add_preset(
            base,
            Entity::new(EntityKind::ACDropShip, "Dropship MK1", "").with_groups(["Craft"]),
        );
        let host = ScriptHost::new(ScriptConfig::new(temp.path()).with_rng_seed(3), presets, "lua");

        let created = host.create(EntityKind::ACraft, "Dropship MK1", "All").unwrap();
        assert_eq!(host.entity(created).unwrap().kind, EntityKind::ACDropShip);
        let random = host.random(EntityKind::ACraft, "Craft", ModuleRef::All).unwrap();
        assert_eq!(host.entity(random).unwrap().kind, EntityKind::ACDropShip);
        assert!(errors(&host).is_empty());
    }

    #[test]
    fn test_file_bridge_diagnostics() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("Base.rte")).unwrap();
        let host = host_with(temp.path());

        assert_eq!(host.file_open("../secrets.txt", "r"), -1);
        assert!(errors(&host).is_empty());

        let handle = host.file_open("Base.rte/notes.txt", "w");
        assert!(handle >= 0);
        host.file_write_line(handle, "hello\n");
        host.file_close(handle);

        let handle = host.file_open("Base.rte/notes.txt", "r");
        assert_eq!(host.file_read_line(handle), "hello\n");
        assert!(host.file_eof(handle));
        assert_eq!(host.file_read_line(handle), "");
        host.file_write_line(99, "x");
        let errors = errors(&host);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("read past EOF"));
        assert!(errors[1].contains("write to a closed file"));
    }
}
