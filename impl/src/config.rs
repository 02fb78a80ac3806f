//! The Type Factory configuration: `{ defaults, debug, override,
//! customTypes }`.

use std::sync::Arc;

use crate::codec::Codec;
use crate::overrides::OverrideTable;

/// A custom type factory: a nullary closure producing a fresh `Codec`
/// instance, with any construction options already closed over by the
/// closure.
pub type CustomTypeFactory = Arc<dyn Fn() -> Arc<dyn Codec> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TypeFactoryConfig {
    /// `toObject()` called with no value returns a representative default
    /// specimen, used for docs/debug. Never affects the wire format.
    pub defaults: bool,
    /// Emit `tracing` spans during compilation describing struct
    /// construction order, alias resolution and override attachment.
    pub debug: bool,
    pub overrides: OverrideTable,
    /// Names in this map shadow built-in primitives and become
    /// referenceable in the schema.
    pub custom_types: std::collections::HashMap<String, CustomTypeFactory>,
}

impl TypeFactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(mut self, defaults: bool) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn register_custom_type(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Arc<dyn Codec> + Send + Sync + 'static,
    ) {
        self.custom_types.insert(name.into(), Arc::new(factory));
    }
}
