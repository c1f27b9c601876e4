use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{Schema, SchemaObject, SingleOrVec, InstanceType};
use std::collections::{BTreeMap, HashMap};
use crate::{SchemaError, Validatable};

/// A value that can be written either as a single string or an array of strings
///
/// Used for preset groups: `"groups": "Tools"` and `"groups": ["Tools", "Weapons"]`
/// are both accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringOrArray(pub Vec<String>);

impl StringOrArray {
    /// Check if the array contains a specific value
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|s| s == value)
    }

    /// Get an iterator over the strings
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl JsonSchema for StringOrArray {
    fn schema_name() -> String {
        "StringOrArray".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let string_schema = SchemaObject {
            instance_type: Some(SingleOrVec::Single(Box::new(InstanceType::String))),
            ..Default::default()
        };

        let array_schema = SchemaObject {
            instance_type: Some(SingleOrVec::Single(Box::new(InstanceType::Array))),
            array: Some(Box::new(schemars::schema::ArrayValidation {
                items: Some(SingleOrVec::Single(Box::new(Schema::Object(string_schema.clone())))),
                ..Default::default()
            })),
            ..Default::default()
        };

        Schema::Object(SchemaObject {
            subschemas: Some(Box::new(schemars::schema::SubschemaValidation {
                any_of: Some(vec![
                    Schema::Object(string_schema),
                    Schema::Object(array_schema),
                ]),
                ..Default::default()
            })),
            ..Default::default()
        })
    }
}

impl Serialize for StringOrArray {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringOrArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct StringOrArrayVisitor;

        impl<'de> Visitor<'de> for StringOrArrayVisitor {
            type Value = StringOrArray;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or array of strings")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(StringOrArray(vec![value.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    values.push(value);
                }
                Ok(StringOrArray(values))
            }
        }

        deserializer.deserialize_any(StringOrArrayVisitor)
    }
}

fn default_buyable() -> bool {
    true
}

/// One preset defined by a data module
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PresetEntry {
    /// Class name of the entity kind (e.g. "AHuman", "HDFirearm")
    #[schemars(description = "Entity class this preset instantiates")]
    pub class: String,

    /// Unique preset name within the module
    #[schemars(description = "Preset name used by Create and Random lookups")]
    pub name: String,

    #[schemars(description = "Free-form description shown in tooltips")]
    #[serde(default)]
    pub description: String,

    /// Groups this preset belongs to
    #[schemars(description = "Group name or list of group names")]
    #[serde(default)]
    pub groups: StringOrArray,

    /// Only buyable presets are picked by Random lookups
    #[schemars(description = "Whether random group lookups may pick this preset")]
    #[serde(default = "default_buyable")]
    pub buyable: bool,

    #[schemars(description = "Numeric properties readable from scripts")]
    #[serde(default)]
    pub number_values: BTreeMap<String, f64>,

    #[schemars(description = "String properties readable from scripts")]
    #[serde(default)]
    pub string_values: BTreeMap<String, String>,
}

/// Data module manifest (`<Module>.rte/presets.json`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Module Manifest")]
#[schemars(description = "Preset definitions of a data module")]
pub struct ModuleManifest {
    /// Human-readable name of the module
    #[schemars(description = "Display name of the module")]
    pub name: String,

    /// Semantic version of the module (e.g., "1.0.0")
    #[schemars(description = "Module version in semver format (major.minor.patch)")]
    pub version: String,

    #[schemars(description = "Brief description of the module")]
    #[serde(default)]
    pub description: String,

    /// Dependencies on other modules.
    /// Key is the module directory name (e.g. "Base.rte").
    /// Value is version constraint: "1.0.0" for exact, "1.0.0,2.0.0" for range (min,max)
    #[schemars(description = "Dependencies: module directory -> version constraint")]
    #[serde(default)]
    pub requires: HashMap<String, String>,

    #[schemars(description = "Presets defined by this module")]
    #[serde(default)]
    pub presets: Vec<PresetEntry>,
}

impl Validatable for ModuleManifest {}

impl ModuleManifest {
    /// Parsed semantic version of the module
    pub fn semver(&self) -> crate::Result<semver::Version> {
        semver::Version::parse(&self.version)
            .map_err(|e| SchemaError::VersionError(self.version.clone(), e))
    }
}

/// Parse a version requirement string
/// Returns (min_version, max_version) tuple
/// If no comma, min == max (exact version)
pub fn parse_version_requirement(requirement: &str) -> (String, String) {
    if let Some((min, max)) = requirement.split_once(',') {
        (min.trim().to_string(), max.trim().to_string())
    } else {
        let exact = requirement.trim().to_string();
        (exact.clone(), exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_manifest() {
        let json = r#"{
            "name": "Base",
            "version": "1.0.0",
            "presets": [
                { "class": "AHuman", "name": "Soldier Light", "groups": ["Actors", "Light Infantry"] },
                { "class": "HDFirearm", "name": "SMG", "groups": "Weapons", "buyable": false,
                  "number_values": { "RateOfFire": 900 } }
            ]
        }"#;

        let manifest = ModuleManifest::from_json_str(json).unwrap();
        assert_eq!(manifest.name, "Base");
        assert_eq!(manifest.presets.len(), 2);
        assert!(manifest.presets[0].groups.contains("Light Infantry"));
        assert!(manifest.presets[0].buyable);
        assert_eq!(manifest.presets[1].groups.0, vec!["Weapons".to_string()]);
        assert!(!manifest.presets[1].buyable);
        assert_eq!(manifest.presets[1].number_values.get("RateOfFire"), Some(&900.0));
    }

    #[test]
    fn test_manifest_without_presets() {
        let json = r#"{ "name": "Empty", "version": "0.1.0" }"#;
        let manifest = ModuleManifest::from_json_str(json).unwrap();
        assert!(manifest.presets.is_empty());
        assert_eq!(manifest.semver().unwrap(), semver::Version::new(0, 1, 0));
    }

    #[test]
    fn test_invalid_manifest_missing_name() {
        let json = r#"{ "version": "1.0.0" }"#;
        assert!(ModuleManifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_preset_groups_type() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0.0",
            "presets": [ { "class": "Actor", "name": "X", "groups": 5 } ]
        }"#;
        assert!(ModuleManifest::from_json_str(json).is_err());
    }

    #[test]
    fn test_bad_semver() {
        let json = r#"{ "name": "Odd", "version": "one" }"#;
        let manifest = ModuleManifest::from_json_str(json).unwrap();
        assert!(manifest.semver().is_err());
    }

    #[test]
    fn test_parse_version_requirement() {
        assert_eq!(
            parse_version_requirement("1.0.0"),
            ("1.0.0".to_string(), "1.0.0".to_string())
        );
        assert_eq!(
            parse_version_requirement("1.0.0, 2.0.0"),
            ("1.0.0".to_string(), "2.0.0".to_string())
        );
    }
}
