/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Containers for the merged contents of a config file: profiles, `sso-session`
//! sections, and the free-form sub-property sections like `[services name]`.

use crate::profile::parser::parse::to_ascii_lowercase;
use std::collections::HashMap;

/// A single `key = value` setting from a config file
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Property {
    key: String,
    value: String,
}

impl Property {
    /// Create a property from its key and value
    pub fn new(key: String, value: String) -> Self {
        Property { key, value }
    }

    /// The setting name
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The setting value
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Fully-qualified address of one sub-property setting:
/// `[<section_type> <section_name>]` / `<group> =` / `  <setting> = ...`
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
struct SettingPath {
    section_type: String,
    section_name: String,
    group: String,
    setting: String,
}

/// Settings from sections that are neither profiles nor `sso-session`s
///
/// Sections like `[services dev]` hold groups of sub-properties:
///
/// ```ini
/// [services dev]
/// s3 =
///   endpoint_url = http://localhost:3000
/// ```
///
/// Each setting is addressed by section type (`services`), section name (`dev`),
/// group (`s3`), and setting name (`endpoint_url`). Later writes to the same
/// address replace earlier ones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Properties {
    settings: HashMap<SettingPath, String>,
}

impl Properties {
    pub(crate) fn insert(
        &mut self,
        section_type: &str,
        section_name: &str,
        group: &str,
        setting: &str,
        value: String,
    ) {
        let path = SettingPath {
            section_type: section_type.to_string(),
            section_name: section_name.to_string(),
            group: group.to_string(),
            setting: setting.to_string(),
        };
        if let Some(previous) = self.settings.insert(path, value) {
            tracing::trace!(
                "overwriting [{section_type} {section_name}].{group}.{setting}: was {previous}"
            );
        }
    }

    /// Look up one setting by its full address
    pub fn get(
        &self,
        section_type: &str,
        section_name: &str,
        group: &str,
        setting: &str,
    ) -> Option<&str> {
        let path = SettingPath {
            section_type: section_type.to_string(),
            section_name: section_name.to_string(),
            group: group.to_string(),
            setting: setting.to_string(),
        };
        self.settings.get(&path).map(String::as_str)
    }
}

/// Name and properties shared by every named section kind
#[derive(Debug, Clone, Eq, PartialEq)]
pub(super) struct SectionData {
    pub(super) name: String,
    pub(super) properties: HashMap<String, Property>,
}

/// A named `[section]` and the settings under it
///
/// Property names are stored lowercased, so lookups are case-insensitive.
pub(crate) trait Section {
    fn data(&self) -> &SectionData;
    fn data_mut(&mut self) -> &mut SectionData;

    /// The name written between the brackets
    fn name(&self) -> &str {
        &self.data().name
    }

    /// Look up the property named `name`
    fn get(&self, name: &str) -> Option<&str> {
        self.data()
            .properties
            .get(to_ascii_lowercase(name).as_ref())
            .map(Property::value)
    }

    /// True when the section holds no properties
    fn is_empty(&self) -> bool {
        self.data().properties.is_empty()
    }

    /// Store a property, replacing any earlier value under the same name
    fn insert(&mut self, name: String, value: Property) {
        self.data_mut()
            .properties
            .insert(to_ascii_lowercase(&name).into(), value);
    }
}

/// One named profile from the config or credentials file
///
/// A [`ProfileSet`](crate::profile::ProfileSet) holds every profile the loaded
/// files define; providers read their settings through [`get`](Profile::get).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Profile(SectionData);

impl Profile {
    /// Create a profile from a name and its properties
    pub fn new(name: impl Into<String>, properties: HashMap<String, Property>) -> Self {
        Self(SectionData {
            name: name.into(),
            properties,
        })
    }

    /// The profile name
    pub fn name(&self) -> &str {
        Section::name(self)
    }

    /// Look up the property named `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        Section::get(self, name)
    }
}

impl Section for Profile {
    fn data(&self) -> &SectionData {
        &self.0
    }

    fn data_mut(&mut self) -> &mut SectionData {
        &mut self.0
    }
}

/// An `[sso-session name]` section
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SsoSession(SectionData);

impl SsoSession {
    pub(super) fn new(name: impl Into<String>, properties: HashMap<String, Property>) -> Self {
        Self(SectionData {
            name: name.into(),
            properties,
        })
    }

    /// Look up the property named `name`
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        Section::get(self, name)
    }
}

impl Section for SsoSession {
    fn data(&self) -> &SectionData {
        &self.0
    }

    fn data_mut(&mut self) -> &mut SectionData {
        &mut self.0
    }
}

#[cfg(test)]
mod test {
    use crate::os_shim::{Env, Fs, Props};
    use crate::profile::parser::load;
    use crate::profile::profile_file::ProfileFiles;
    use std::collections::HashMap;

    #[test]
    fn sub_property_settings_are_addressable() {
        let _ = tracing_subscriber::fmt::try_init();
        const CFG: &str = r#"[default]
services = foo

[services foo]
s3 =
  endpoint_url = http://localhost:3000/path?a=b
  setting_a = foo
  setting_b = bar

ec2 =
  endpoint_url = http://localhost:2000
  setting_a = foo

[services bar]
ec2 =
  endpoint_url = http://localhost:3000
  setting_b = bar
"#;
        let env = Env::from_slice(&[("HOME", "/home/test"), ("AWS_CONFIG_FILE", "config")]);
        let mut files = HashMap::new();
        files.insert("config".to_string(), CFG.into());
        let fs = Fs::from_map(files);

        let p = load(&fs, &env, &Props::empty(), &ProfileFiles::default(), None)
            .expect("config loads");
        let other_sections = p.other_sections();

        // the value keeps everything after the first `=`
        assert_eq!(
            other_sections.get("services", "foo", "s3", "endpoint_url"),
            Some("http://localhost:3000/path?a=b")
        );
        assert_eq!(
            other_sections.get("services", "foo", "s3", "setting_a"),
            Some("foo")
        );
        assert_eq!(
            other_sections.get("services", "foo", "s3", "setting_b"),
            Some("bar")
        );

        assert_eq!(
            other_sections.get("services", "foo", "ec2", "endpoint_url"),
            Some("http://localhost:2000")
        );
        assert_eq!(
            other_sections.get("services", "foo", "ec2", "setting_a"),
            Some("foo")
        );

        assert_eq!(
            other_sections.get("services", "bar", "ec2", "endpoint_url"),
            Some("http://localhost:3000")
        );
        assert_eq!(
            other_sections.get("services", "bar", "ec2", "setting_b"),
            Some("bar")
        );
        assert_eq!(other_sections.get("services", "baz", "ec2", "setting_b"), None);
    }
}
