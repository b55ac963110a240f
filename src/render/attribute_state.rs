//! Named renderer attributes applied as state.

use std::collections::BTreeMap;
use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, STATE_RENDERABLE,
};
use crate::hash::MurmurHash;
use crate::objects::{hash_members, members_equal};
use crate::util::{InternedString, Result};

use super::{Renderer, StateRenderable};

pub static ATTRIBUTE_STATE: TypeDescription =
    TypeDescription::new(TypeId::ATTRIBUTE_STATE, "AttributeState", Some(&STATE_RENDERABLE));

const IO_VERSION: u32 = 0;
const ATTRIBUTES_ENTRY: &str = "attributes";

/// Attributes set on the renderer when this state is rendered.
#[derive(Debug, Default)]
pub struct AttributeState {
    attributes: BTreeMap<InternedString, ObjectPtr>,
}

impl AttributeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &BTreeMap<InternedString, ObjectPtr> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut BTreeMap<InternedString, ObjectPtr> {
        &mut self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&ObjectPtr> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: impl Into<InternedString>, value: ObjectPtr) {
        self.attributes.insert(name.into(), value);
    }
}

impl StateRenderable for AttributeState {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        for (name, value) in &self.attributes {
            renderer.set_attribute(name, value)?;
        }
        Ok(())
    }
}

impl Object for AttributeState {
    object_accessors!(ATTRIBUTE_STATE);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&ATTRIBUTE_STATE, other)?;
        self.attributes.clear();
        for (name, value) in &other.attributes {
            self.attributes.insert(name.clone(), ctx.copy(value)?);
        }
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        object::is_equal_to(self, other)
            && other
                .downcast_ref::<Self>()
                .is_some_and(|o| members_equal(&self.attributes, &o.attributes))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        hash_members(&self.attributes, h);
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate(self.attributes.len() * (size_of::<InternedString>() + size_of::<ObjectPtr>()));
        for value in self.attributes.values() {
            acc.accumulate_object(value);
        }
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(ATTRIBUTE_STATE.name, IO_VERSION)?;
        let attributes = container.create_subdirectory(ATTRIBUTES_ENTRY)?;
        for (name, value) in &self.attributes {
            ctx.save(value, &attributes, name)?;
        }
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(ATTRIBUTE_STATE.name, &mut version)?;
        let attributes = container.subdirectory(ATTRIBUTES_ENTRY)?;
        self.attributes.clear();
        for name in attributes.entry_ids() {
            let value = ctx.load(&attributes, &name)?;
            self.attributes.insert(name, value);
        }
        Ok(())
    }

    fn as_state_renderable(&self) -> Option<&dyn StateRenderable> {
        Some(self)
    }
}

impl ObjectType for AttributeState {
    fn static_description() -> &'static TypeDescription {
        &ATTRIBUTE_STATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BoolData, StringData};
    use crate::io::MemoryIndexedIo;
    use crate::render::{RecordingRenderer, RenderCall};

    fn sample() -> AttributeState {
        let mut a = AttributeState::new();
        a.set("visible", ObjectPtr::new(BoolData::new(true)));
        a.set("name", ObjectPtr::new(StringData::new("ball".into())));
        a
    }

    #[test]
    fn test_render_sets_attributes_in_name_order() {
        let mut r = RecordingRenderer::new();
        sample().render(&mut r).unwrap();
        assert_eq!(
            r.calls,
            [
                RenderCall::SetAttribute("name".into()),
                RenderCall::SetAttribute("visible".into()),
            ]
        );
    }

    #[test]
    fn test_round_trip() {
        let src = ObjectPtr::new(sample());
        let io = MemoryIndexedIo::create();
        src.save(&io, "a").unwrap();
        let loaded = ObjectPtr::load(&io, "a").unwrap();
        assert!(loaded.is_equal_to(&src));
        assert_eq!(loaded.hash(), src.hash());
    }
}
