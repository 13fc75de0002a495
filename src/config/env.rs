//! Environment sources
//!
//! Resolution never reads the process environment directly. It goes through an
//! [`EnvironmentSource`], which exposes two layers: explicit properties
//! (the JVM-style `-Dname=value` overrides the CLI accepts) and OS environment
//! variables. Properties always win over variables of the same name.

use std::collections::HashMap;
use std::env;
use log::debug;

/// Source of named configuration values
pub trait EnvironmentSource: Send + Sync {
    /// Look up an explicit property override
    fn property(&self, name: &str) -> Option<String>;

    /// Look up an environment variable
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment plus a property map supplied by the caller
#[derive(Debug, Clone, Default)]
pub struct ProcessEnvironment {
    properties: HashMap<String, String>,
}

impl ProcessEnvironment {
    /// Process environment without any property overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Process environment with the given property overrides
    pub fn with_properties(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }

    /// Add or replace a property override
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }
}

impl EnvironmentSource for ProcessEnvironment {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Fully in-memory environment
///
/// Used by tests and by embedders that already hold their settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnvironment {
    properties: HashMap<String, String>,
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Set a property override
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl EnvironmentSource for MapEnvironment {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Typed lookups over an [`EnvironmentSource`]
///
/// Blank values are treated as absent on both layers.
#[derive(Clone, Copy)]
pub struct EnvResolver<'a> {
    source: &'a dyn EnvironmentSource,
}

impl<'a> EnvResolver<'a> {
    pub fn new(source: &'a dyn EnvironmentSource) -> Self {
        Self { source }
    }

    /// Whether `name` is set as a property or an environment variable
    pub fn has_var(&self, name: &str) -> bool {
        self.get_string(name).is_some()
    }

    /// Property `name`, else environment variable `name`
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get_property_or_var(name, name)
    }

    /// Property `property`, else environment variable `var`
    pub fn get_property_or_var(&self, property: &str, var: &str) -> Option<String> {
        non_blank(self.source.property(property))
            .or_else(|| non_blank(self.source.var(var)))
    }

    pub fn get_string_or(&self, name: &str, default: &str) -> String {
        self.get_string(name).unwrap_or_else(|| default.to_string())
    }

    /// Boolean value of `name`; unparseable values fall back to `default`
    pub fn get_bool_or(&self, name: &str, default: bool) -> bool {
        match self.get_string(name) {
            Some(value) => parse_bool(&value).unwrap_or_else(|| {
                debug!("Ignoring non-boolean value '{}' for {}", value, name);
                default
            }),
            None => default,
        }
    }

    /// Boolean value of `name` when it is set and parseable
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_string(name).and_then(|value| parse_bool(&value))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
