/// Preset registry
///
/// Presets are the template entities defined by data modules. Scripts never touch
/// them directly: `Create*`/`Random*` look a preset up and hand the script a clone.
///
/// A data module is a directory under the data dir whose name ends with the module
/// suffix (`.rte`). Its presets come from an optional `presets.json` manifest.
/// Modules are numbered in load order and the base module always loads first.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lcon_schema::{ModuleManifest, PresetEntry, Validatable, validate_module_dependencies};
use tracing::{debug, info, warn};

use super::entity::{Entity, EntityKind};
use crate::error::PresetError;

/// Manifest file looked up inside every module directory
pub const MANIFEST_FILE: &str = "presets.json";

/// Which module(s) a lookup should search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRef<'a> {
    /// Every loaded module, in load order
    All,
    Name(&'a str),
    Id(usize),
}

impl<'a> ModuleRef<'a> {
    /// Interpret a module name as given by a script ("All" means every module)
    pub fn from_name(name: &'a str) -> Self {
        if name.is_empty() || name == "All" {
            ModuleRef::All
        } else {
            ModuleRef::Name(name)
        }
    }
}

/// Read access to presets, as needed by the scripting bridge
pub trait PresetLookup {
    /// Find a preset of `kind` (or any kind deriving from it) by name
    fn find_preset(&self, kind: EntityKind, preset_name: &str, module: ModuleRef<'_>) -> Option<&Entity>;

    /// All buyable presets of `kind` in `group` (`"Any"` matches every group)
    fn buyable_in_group(&self, kind: EntityKind, group: &str, module: ModuleRef<'_>) -> Vec<&Entity>;

    fn module_id(&self, name: &str) -> Option<usize>;

    fn module_name(&self, id: usize) -> Option<&str>;

    /// Names of every loaded module, in load order
    fn module_names(&self) -> Vec<String>;
}

/// One loaded data module
#[derive(Debug, Clone)]
pub struct DataModule {
    /// Directory name, e.g. "Base.rte"
    pub name: String,
    /// Friendly name from the manifest
    pub display_name: String,
    pub version: String,
    presets: Vec<Entity>,
}

impl DataModule {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            version: "0.0.0".to_string(),
            presets: Vec::new(),
        }
    }

    pub fn presets(&self) -> &[Entity] {
        &self.presets
    }
}

/// In-memory preset store
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    modules: Vec<DataModule>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty module and return its id
    pub fn add_module(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(id) = self.module_id(&name) {
            return id;
        }
        self.modules.push(DataModule::new(name));
        self.modules.len() - 1
    }

    /// Add a preset to a module
    ///
    /// A preset with the same class and name already in the module is kept and
    /// the new one is dropped.
    pub fn add_preset(&mut self, module_id: usize, mut preset: Entity) -> bool {
        let Some(module) = self.modules.get_mut(module_id) else {
            return false;
        };
        if module
            .presets
            .iter()
            .any(|p| p.kind == preset.kind && p.preset_name == preset.preset_name)
        {
            warn!(
                module = %module.name,
                preset = %preset.preset_name,
                "Duplicate preset ignored"
            );
            return false;
        }
        preset.module = module.name.clone();
        module.presets.push(preset);
        true
    }

    pub fn modules(&self) -> &[DataModule] {
        &self.modules
    }

    pub fn preset_count(&self) -> usize {
        self.modules.iter().map(|m| m.presets.len()).sum()
    }

    /// Scan `data_dir` for module directories and load their manifests
    ///
    /// # Arguments
    /// * `data_dir` - Directory holding the `*.rte` module folders
    /// * `module_suffix` - Suffix that marks a module folder (usually ".rte")
    /// * `base_module` - Module loaded first, regardless of name order
    ///
    /// Broken manifests are reported and skipped; only an unreadable data dir is an error.
    pub fn load_data_dir(
        data_dir: &Path,
        module_suffix: &str,
        base_module: &str,
    ) -> Result<Self, PresetError> {
        let entries = fs::read_dir(data_dir).map_err(|source| PresetError::DataDir {
            path: data_dir.display().to_string(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(module_suffix))
            .collect();
        names.sort_by(|a, b| (a != base_module, a).cmp(&(b != base_module, b)));

        let mut registry = Self::new();
        let mut manifests = HashMap::new();

        for name in names {
            let module_id = registry.add_module(name.clone());
            let manifest_path = data_dir.join(&name).join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                debug!(module = %name, "Module has no preset manifest");
                continue;
            }

            let manifest = match ModuleManifest::from_json_file(&manifest_path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(module = %name, "Failed to load preset manifest: {}", e);
                    continue;
                }
            };
            if let Err(e) = manifest.semver() {
                warn!(module = %name, "{}", e);
            }

            registry.modules[module_id].display_name = manifest.name.clone();
            registry.modules[module_id].version = manifest.version.clone();

            for entry in &manifest.presets {
                match preset_from_entry(entry) {
                    Some(preset) => {
                        registry.add_preset(module_id, preset);
                    }
                    None => warn!(
                        module = %name,
                        preset = %entry.name,
                        "Unknown entity class '{}'",
                        entry.class
                    ),
                }
            }
            manifests.insert(name, manifest);
        }

        for (name, manifest) in &manifests {
            if let Err(e) = validate_module_dependencies(name, manifest, &manifests) {
                warn!("{}", e);
            }
        }

        info!(
            modules = registry.modules.len(),
            presets = registry.preset_count(),
            "Loaded data modules from {}",
            data_dir.display()
        );
        Ok(registry)
    }

    fn modules_for(&self, module: ModuleRef<'_>) -> Vec<&DataModule> {
        match module {
            ModuleRef::All => self.modules.iter().collect(),
            ModuleRef::Name(name) => self.modules.iter().filter(|m| m.name == name).collect(),
            ModuleRef::Id(id) => self.modules.get(id).into_iter().collect(),
        }
    }
}

fn preset_from_entry(entry: &PresetEntry) -> Option<Entity> {
    let kind = EntityKind::from_name(&entry.class)?;
    let mut preset = Entity::new(kind, entry.name.clone(), String::new())
        .with_groups(entry.groups.iter().cloned());
    preset.description = entry.description.clone();
    preset.buyable = entry.buyable;
    preset.number_values = entry.number_values.clone();
    preset.string_values = entry.string_values.clone();
    Some(preset)
}

impl PresetLookup for PresetRegistry {
    fn find_preset(&self, kind: EntityKind, preset_name: &str, module: ModuleRef<'_>) -> Option<&Entity> {
        self.modules_for(module)
            .into_iter()
            .flat_map(|m| m.presets.iter())
            .find(|p| p.preset_name == preset_name && p.kind.is_a(kind))
    }

    fn buyable_in_group(&self, kind: EntityKind, group: &str, module: ModuleRef<'_>) -> Vec<&Entity> {
        self.modules_for(module)
            .into_iter()
            .flat_map(|m| m.presets.iter())
            .filter(|p| p.buyable && p.kind.is_a(kind) && p.is_in_group(group))
            .collect()
    }

    fn module_id(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name == name)
    }

    fn module_name(&self, id: usize) -> Option<&str> {
        self.modules.get(id).map(|m| m.name.as_str())
    }

    fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_registry() -> PresetRegistry {
        let mut registry = PresetRegistry::new();
        let base = registry.add_module("Base.rte");
        let extra = registry.add_module("Extra.rte");
        registry.add_preset(
            base,
            Entity::new(EntityKind::AHuman, "Soldier Light", "").with_groups(["Actors", "Light Infantry"]),
        );
        registry.add_preset(base, Entity::new(EntityKind::HDFirearm, "SMG", "").with_groups(["Weapons"]));
        registry.add_preset(extra, Entity::new(EntityKind::ACrab, "Crab", "").with_groups(["Actors"]));
        registry
    }

    #[test]
    fn test_find_preset_by_kind_and_ancestor() {
        let registry = sample_registry();
        let soldier = registry.find_preset(EntityKind::AHuman, "Soldier Light", ModuleRef::All);
        assert_eq!(soldier.map(|p| p.module.as_str()), Some("Base.rte"));
        assert!(registry.find_preset(EntityKind::Actor, "Soldier Light", ModuleRef::All).is_some());
        assert!(registry.find_preset(EntityKind::ACrab, "Soldier Light", ModuleRef::All).is_none());
        assert!(registry.find_preset(EntityKind::AHuman, "Soldier Light", ModuleRef::Name("Extra.rte")).is_none());
    }

    #[test]
    fn test_buyable_in_group() {
        let mut registry = sample_registry();
        let base = registry.module_id("Base.rte").unwrap();
        let mut hidden = Entity::new(EntityKind::AHuman, "Hidden", "").with_groups(["Actors"]);
        hidden.buyable = false;
        registry.add_preset(base, hidden);

        let actors = registry.buyable_in_group(EntityKind::Actor, "Actors", ModuleRef::All);
        assert_eq!(actors.len(), 2);
        let any = registry.buyable_in_group(EntityKind::Entity, "Any", ModuleRef::Id(base));
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn test_duplicate_preset_is_ignored() {
        let mut registry = sample_registry();
        assert!(!registry.add_preset(0, Entity::new(EntityKind::HDFirearm, "SMG", "")));
        assert_eq!(registry.preset_count(), 3);
    }

    #[test]
    fn test_module_ref_from_name() {
        assert_eq!(ModuleRef::from_name("All"), ModuleRef::All);
        assert_eq!(ModuleRef::from_name(""), ModuleRef::All);
        assert_eq!(ModuleRef::from_name("Base.rte"), ModuleRef::Name("Base.rte"));
    }

    #[test]
    fn test_load_data_dir() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("Alpha.rte")).unwrap();
        fs::create_dir(root.join("Base.rte")).unwrap();
        fs::create_dir(root.join("NotAModule")).unwrap();
        fs::write(
            root.join("Base.rte").join(MANIFEST_FILE),
            r#"{ "name": "Base", "version": "1.0.0", "presets": [
                { "class": "AHuman", "name": "Soldier", "groups": "Actors" },
                { "class": "Spaceship", "name": "Nope" }
            ] }"#,
        )
        .unwrap();
        fs::write(root.join("Alpha.rte").join(MANIFEST_FILE), "not json").unwrap();

        let registry = PresetRegistry::load_data_dir(root, ".rte", "Base.rte").unwrap();
        assert_eq!(registry.module_names(), vec!["Base.rte".to_string(), "Alpha.rte".to_string()]);
        assert_eq!(registry.preset_count(), 1);
        assert_eq!(registry.modules()[0].display_name, "Base");
        assert!(registry.find_preset(EntityKind::AHuman, "Soldier", ModuleRef::Name("Base.rte")).is_some());
    }

    #[test]
    fn test_load_missing_data_dir() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing");
        assert!(PresetRegistry::load_data_dir(&missing, ".rte", "Base.rte").is_err());
    }
}
