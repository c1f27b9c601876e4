//! Lua bindings for the script host
//!
//! Every global a script can reach is registered here, once, when the adapter is
//! created. The functions only convert between Lua values and host types; the
//! behaviour and every diagnostic live in `ScriptHost`.
//!
//! # Entity families
//!
//! For each kind in the entity table the following globals exist:
//!
//! - `Create<Kind>(presetName, moduleName = "All")` (concrete kinds only)
//! - `Random<Kind>(groupName = "Any", moduleNameOrId = "All")` (concrete kinds only)
//! - `Clone<Kind>(entity)`, `To<Kind>(entity)`, `Is<Kind>(entity)`
//!
//! They are generated from the kind table, so adding a kind adds its family.

use std::cell::Cell;
use std::rc::Rc;

use mlua::{Lua, MetaMethod, MultiValue, Table, UserData, UserDataFields, UserDataMethods, Value};

use crate::api::console::ConsoleRequest;
use crate::api::entity::{Entity, EntityId, EntityKind};
use crate::api::presets::ModuleRef;
use crate::host::ScriptHost;

const DANGLING_HANDLE: &str = "Tried to access an entity that has already been deleted!";

/// Script-side handle to a registry slot
#[derive(Clone)]
pub struct LuaEntity {
    id: EntityId,
    host: Rc<ScriptHost>,
}

impl LuaEntity {
    pub fn new(host: Rc<ScriptHost>, id: EntityId) -> Self {
        Self { id, host }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Run `f` on the entity, reporting a dangling handle
    fn read<R>(&self, f: impl FnOnce(&Entity) -> R) -> Option<R> {
        let result = self.host.entities().get(self.id).map(f);
        if result.is_none() {
            self.host.report_error(DANGLING_HANDLE);
        }
        result
    }

    fn write(&self, f: impl FnOnce(&mut Entity)) {
        let found = self.host.entities_mut().get_mut(self.id).map(f).is_some();
        if !found {
            self.host.report_error(DANGLING_HANDLE);
        }
    }
}

impl UserData for LuaEntity {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("PresetName", |_, this| {
            Ok(this.read(|e| e.preset_name.clone()))
        });
        fields.add_field_method_set("PresetName", |_, this, name: String| {
            this.write(|e| e.preset_name = name);
            Ok(())
        });
        fields.add_field_method_get("ClassName", |_, this| Ok(this.read(|e| e.class_name())));
        fields.add_field_method_get("ModuleName", |_, this| Ok(this.read(|e| e.module.clone())));
        fields.add_field_method_get("Description", |_, this| {
            Ok(this.read(|e| e.description.clone()))
        });
        fields.add_field_method_get("IsValid", |_, this| Ok(this.host.entities().contains(this.id)));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("Clone", |_, this, ()| {
            let kind = this.host.entity(this.id).map(|e| e.kind).unwrap_or(EntityKind::Entity);
            Ok(this
                .host
                .clone_entity(kind, Some(this.id))
                .map(|id| LuaEntity::new(Rc::clone(&this.host), id)))
        });

        methods.add_method("IsInGroup", |_, this, group: String| {
            Ok(this.read(|e| e.is_in_group(&group)).unwrap_or(false))
        });

        methods.add_method("AddToGroup", |_, this, group: String| {
            this.write(|e| {
                e.groups.insert(group);
            });
            Ok(())
        });

        methods.add_method("GetNumberValue", |_, this, key: String| {
            Ok(this
                .read(|e| e.number_values.get(&key).copied().unwrap_or(0.0))
                .unwrap_or(0.0))
        });

        methods.add_method("SetNumberValue", |_, this, (key, value): (String, f64)| {
            this.write(|e| {
                e.number_values.insert(key, value);
            });
            Ok(())
        });

        methods.add_method("GetStringValue", |_, this, key: String| {
            Ok(this
                .read(|e| e.string_values.get(&key).cloned().unwrap_or_default())
                .unwrap_or_default())
        });

        methods.add_method("SetStringValue", |_, this, (key, value): (String, String)| {
            this.write(|e| {
                e.string_values.insert(key, value);
            });
            Ok(())
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this.host.entity(this.id) {
                Some(e) => format!("{} \"{}\" {}", e.kind, e.preset_name, this.id),
                None => format!("Entity {} (deleted)", this.id),
            })
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(entity_arg(&other).ok().flatten() == Some(this.id))
        });
    }
}

/// Accept nil or an entity handle
fn entity_arg(value: &Value) -> mlua::Result<Option<EntityId>> {
    match value {
        Value::Nil => Ok(None),
        Value::UserData(ud) => Ok(Some(ud.borrow::<LuaEntity>()?.id)),
        other => Err(mlua::Error::runtime(format!(
            "expected an entity reference, got {}",
            other.type_name()
        ))),
    }
}

/// Like `entity_arg`, but a wrong-typed value is reported and yields `None`
fn soft_entity_arg(host: &ScriptHost, function: &str, value: &Value) -> Option<Option<EntityId>> {
    match entity_arg(value) {
        Ok(id) => Some(id),
        Err(_) => {
            host.report_bad_argument(function, "an entity reference", value.type_name());
            None
        }
    }
}

fn handle(host: &Rc<ScriptHost>, id: Option<EntityId>) -> Option<LuaEntity> {
    id.map(|id| LuaEntity::new(Rc::clone(host), id))
}

/// Register `Create*`, `Random*`, `Clone*`, `To*` and `Is*` for every kind plus
/// `DeleteEntity`, `SubmitEntity` and `TempEntities`
pub fn setup_entity_api(lua: &Lua, host: &Rc<ScriptHost>) -> mlua::Result<()> {
    let globals = lua.globals();

    for kind in EntityKind::ALL {
        if kind.is_concrete() {
            let h = Rc::clone(host);
            let create = lua.create_function(move |_, (preset, module): (String, Option<String>)| {
                let module = module.unwrap_or_else(|| "All".to_string());
                Ok(handle(&h, h.create(kind, &preset, &module)))
            })?;
            globals.set(format!("Create{}", kind.name()), create)?;

            let h = Rc::clone(host);
            let random = lua.create_function(move |_, (group, module): (Option<String>, Value)| {
                let group = group.unwrap_or_else(|| "Any".to_string());
                let module_name;
                let module_ref = match &module {
                    Value::Nil => ModuleRef::All,
                    Value::Integer(id) if *id >= 0 => ModuleRef::Id(*id as usize),
                    Value::Number(id) if *id >= 0.0 => ModuleRef::Id(*id as usize),
                    Value::String(name) => {
                        module_name = name.to_string_lossy().to_string();
                        ModuleRef::from_name(&module_name)
                    }
                    other => {
                        h.report_bad_argument(
                            &format!("Random{}", kind.name()),
                            "a module name or id",
                            other.type_name(),
                        );
                        return Ok(None);
                    }
                };
                Ok(handle(&h, h.random(kind, &group, module_ref)))
            })?;
            globals.set(format!("Random{}", kind.name()), random)?;
        }

        let h = Rc::clone(host);
        let name = format!("Clone{}", kind.name());
        let clone = lua.create_function(move |_, value: Value| {
            Ok(match soft_entity_arg(&h, &name, &value) {
                Some(id) => handle(&h, h.clone_entity(kind, id)),
                None => None,
            })
        })?;
        globals.set(format!("Clone{}", kind.name()), clone)?;

        let h = Rc::clone(host);
        let name = format!("To{}", kind.name());
        let cast = lua.create_function(move |_, value: Value| {
            Ok(match soft_entity_arg(&h, &name, &value) {
                Some(id) => handle(&h, h.cast(kind, id)),
                None => None,
            })
        })?;
        globals.set(format!("To{}", kind.name()), cast)?;

        let h = Rc::clone(host);
        let is = lua.create_function(move |_, value: Value| {
            Ok(h.is_kind(kind, entity_arg(&value).ok().flatten()))
        })?;
        globals.set(format!("Is{}", kind.name()), is)?;
    }

    let h = Rc::clone(host);
    let delete = lua.create_function(move |_, value: Value| {
        h.delete_entity(entity_arg(&value)?);
        Ok(Value::Nil)
    })?;
    globals.set("DeleteEntity", delete)?;

    let h = Rc::clone(host);
    let submit = lua.create_function(move |_, value: Value| Ok(h.submit_entity(entity_arg(&value)?)))?;
    globals.set("SubmitEntity", submit)?;

    // Returns an iterator over the argument batch of the current scripted call
    let h = Rc::clone(host);
    let temp_entities = lua.create_function(move |lua, ()| {
        let ids = h.temp_entities();
        let cursor = Cell::new(0usize);
        let host = Rc::clone(&h);
        lua.create_function(move |_, ()| {
            let index = cursor.get();
            cursor.set(index + 1);
            Ok(handle(&host, ids.get(index).copied()))
        })
    })?;
    globals.set("TempEntities", temp_entities)?;

    Ok(())
}

/// Register the `Files` table
pub fn setup_file_api(lua: &Lua, host: &Rc<ScriptHost>) -> mlua::Result<()> {
    let files = lua.create_table()?;

    let h = Rc::clone(host);
    files.set(
        "Open",
        lua.create_function(move |_, (path, mode): (String, Option<String>)| {
            Ok(h.file_open(&path, mode.as_deref().unwrap_or("r")))
        })?,
    )?;

    let h = Rc::clone(host);
    files.set(
        "Close",
        lua.create_function(move |_, handle: i64| {
            h.file_close(handle);
            Ok(())
        })?,
    )?;

    let h = Rc::clone(host);
    files.set(
        "CloseAll",
        lua.create_function(move |_, ()| {
            h.file_close_all();
            Ok(())
        })?,
    )?;

    let h = Rc::clone(host);
    files.set(
        "ReadLine",
        lua.create_function(move |_, handle: i64| Ok(h.file_read_line(handle)))?,
    )?;

    let h = Rc::clone(host);
    files.set(
        "WriteLine",
        lua.create_function(move |_, (handle, text): (i64, String)| {
            h.file_write_line(handle, &text);
            Ok(())
        })?,
    )?;

    let h = Rc::clone(host);
    files.set(
        "Eof",
        lua.create_function(move |_, handle: i64| Ok(h.file_eof(handle)))?,
    )?;

    lua.globals().set("Files", files)?;
    Ok(())
}

/// Join print arguments the way Lua's own `print` does
fn print_line(lua: &Lua, args: MultiValue) -> mlua::Result<String> {
    let tostring: mlua::Function = lua.globals().get("tostring")?;
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(tostring.call::<String>(value)?);
    }
    Ok(parts.join("\t"))
}

/// Register `print`, `cls` and the `Console` table
pub fn setup_console_api(lua: &Lua, host: &Rc<ScriptHost>) -> mlua::Result<()> {
    let globals = lua.globals();

    let h = Rc::clone(host);
    let print = lua.create_function(move |lua, args: MultiValue| {
        let line = print_line(lua, args)?;
        h.console().print(&line);
        Ok(())
    })?;
    globals.set("print", print.clone())?;

    let h = Rc::clone(host);
    let cls = lua.create_function(move |_, ()| {
        h.console().request(ConsoleRequest::Clear);
        Ok(())
    })?;
    globals.set("cls", cls.clone())?;

    let console: Table = lua.create_table()?;
    console.set("Print", print)?;
    console.set("Clear", cls)?;

    let h = Rc::clone(host);
    console.set(
        "SaveAllText",
        lua.create_function(move |_, path: Option<String>| {
            h.console().request(ConsoleRequest::SaveAllText(path));
            Ok(())
        })?,
    )?;

    let h = Rc::clone(host);
    console.set(
        "SaveInputLog",
        lua.create_function(move |_, path: Option<String>| {
            h.console().request(ConsoleRequest::SaveInputLog(path));
            Ok(())
        })?,
    )?;

    globals.set("Console", console)?;
    Ok(())
}

/// Strip the standard library down and point `require` at the base module
pub fn setup_environment(lua: &Lua, host: &ScriptHost) -> mlua::Result<()> {
    let globals = lua.globals();

    // File access goes through `Files` only
    globals.set("io", Value::Nil)?;
    globals.set("dofile", Value::Nil)?;
    globals.set("loadfile", Value::Nil)?;
    if let Ok(os) = globals.get::<Table>("os") {
        for name in ["execute", "exit", "remove", "rename", "tmpname"] {
            os.set(name, Value::Nil)?;
        }
    }

    let package: Table = globals.get("package")?;
    let current: String = package.get("path")?;
    let base = host
        .config()
        .working_dir()
        .join(host.config().base_module())
        .join("?.lua");
    package.set("path", format!("{};{}", base.display(), current))?;
    Ok(())
}
