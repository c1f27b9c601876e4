use std::collections::HashMap;

use semver::Version;

use crate::{ModuleManifest, parse_version_requirement};

/// Validate if a version is within the specified range (inclusive on both ends).
pub fn validate_version_range(
    context: &str,
    installed_version: &str,
    min_version: &str,
    max_version: &str,
) -> Result<(), String> {
    let installed = Version::parse(installed_version).map_err(|e| {
        format!(
            "{}: Invalid installed version '{}': {}",
            context, installed_version, e
        )
    })?;
    let min = Version::parse(min_version)
        .map_err(|e| format!("{}: Invalid min_version '{}': {}", context, min_version, e))?;
    let max = Version::parse(max_version)
        .map_err(|e| format!("{}: Invalid max_version '{}': {}", context, max_version, e))?;

    if installed < min {
        return Err(format!(
            "{}: version {} is below minimum required version {}",
            context, installed_version, min_version
        ));
    }
    if installed > max {
        return Err(format!(
            "{}: version {} is above maximum supported version {}",
            context, installed_version, max_version
        ));
    }

    Ok(())
}

/// Validate the `requires` table of a module against the other loaded modules.
pub fn validate_module_dependencies(
    module_id: &str,
    manifest: &ModuleManifest,
    all_manifests: &HashMap<String, ModuleManifest>,
) -> Result<(), String> {
    for (dep_id, version_req) in &manifest.requires {
        let (min_ver, max_ver) = parse_version_requirement(version_req);
        let Some(dep_manifest) = all_manifests.get(dep_id) else {
            return Err(format!(
                "Module '{}' requires module '{}' which is not available",
                module_id, dep_id
            ));
        };
        validate_version_range(
            &format!("Module '{}' requires '{}'", module_id, dep_id),
            &dep_manifest.version,
            &min_ver,
            &max_ver,
        )?;
    }

    Ok(())
}
