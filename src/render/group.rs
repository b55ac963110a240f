//! Hierarchical grouping of renderables.

use std::mem::size_of;

use crate::core::object::{self, object_accessors};
use crate::core::{
    CopyContext, LoadContext, MemoryAccumulator, Object, ObjectPtr, ObjectType, SaveContext,
    TypeDescription, TypeId, WeakObjectPtr, VISIBLE_RENDERABLE,
};
use crate::hash::MurmurHash;
use crate::io::IndexedIoPtr;
use crate::util::{Box3f, Error, InternedString, Mat4, Result};

use super::{AttributeBlock, AttributeState, Renderer, VisibleRenderable};

pub static GROUP: TypeDescription = TypeDescription::new(TypeId::GROUP, "Group", Some(&VISIBLE_RENDERABLE));

const IO_VERSION: u32 = 0;
const TRANSFORM_ENTRY: &str = "transform";
const STATE_ENTRY: &str = "state";
const CHILDREN_ENTRY: &str = "children";

/// A transform, state and child renderables, rendered in one attribute scope.
///
/// Children that are groups point back at their parent through a weak
/// handle. Structural changes that involve parent links go through the
/// associated functions taking the group's [`ObjectPtr`].
#[derive(Debug, Default)]
pub struct Group {
    transform: Option<ObjectPtr>,
    state: Vec<ObjectPtr>,
    children: Vec<ObjectPtr>,
    parent: WeakObjectPtr,
}

fn expect_group(group: &ObjectPtr) -> Result<()> {
    if group.is::<Group>() {
        Ok(())
    } else {
        Err(Error::type_mismatch(GROUP.name, group.type_name()))
    }
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform(&self) -> Option<&ObjectPtr> {
        self.transform.as_ref()
    }

    /// Set or clear the transform. Only transforms are accepted.
    pub fn set_transform(&mut self, transform: Option<ObjectPtr>) -> Result<()> {
        if let Some(t) = &transform {
            let guard = t.read();
            if guard.as_transform().is_none() {
                return Err(Error::type_mismatch("Transform", guard.type_name()));
            }
        }
        self.transform = transform;
        Ok(())
    }

    /// Local transform at `time`; identity without a transform.
    pub fn transform_matrix(&self, time: f32) -> Mat4 {
        self.transform
            .as_ref()
            .and_then(|t| super::transform_matrix(t, time))
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Transform from this group's space to the root's space.
    pub fn global_transform_matrix(&self, time: f32) -> Mat4 {
        let local = self.transform_matrix(time);
        let Some(parent) = self.parent() else {
            return local;
        };
        let global = parent
            .downcast_ref::<Group>()
            .map_or(local, |p| p.global_transform_matrix(time) * local);
        global
    }

    pub fn state(&self) -> &[ObjectPtr] {
        &self.state
    }

    /// Append a state renderable. Transforms belong in [`Group::set_transform`].
    pub fn add_state(&mut self, state: ObjectPtr) -> Result<()> {
        {
            let guard = state.read();
            if guard.as_transform().is_some() {
                return Err(Error::argument("Transforms cannot be added as state."));
            }
            if guard.as_state_renderable().is_none() {
                return Err(Error::type_mismatch("StateRenderable", guard.type_name()));
            }
        }
        self.state.push(state);
        Ok(())
    }

    pub fn remove_state(&mut self, state: &ObjectPtr) -> Result<()> {
        let index = self
            .state
            .iter()
            .position(|s| s.ptr_eq(state))
            .ok_or_else(|| Error::argument("State not present in Group."))?;
        self.state.remove(index);
        Ok(())
    }

    pub fn clear_state(&mut self) {
        self.state.clear();
    }

    /// Attribute value from the nearest state, searching later state first
    /// and then the parents.
    pub fn get_attribute(&self, name: &str) -> Option<ObjectPtr> {
        for state in self.state.iter().rev() {
            if let Some(attributes) = state.downcast_ref::<AttributeState>() {
                if let Some(value) = attributes.get(name) {
                    return Some(value.clone());
                }
            }
        }
        let parent = self.parent()?;
        let group = parent.downcast_ref::<Group>()?;
        group.get_attribute(name)
    }

    /// Store a copy of `value` in this group's attribute state, creating the
    /// state when needed.
    pub fn set_attribute(&mut self, name: &str, value: &ObjectPtr) -> Result<()> {
        let value = value.copy()?;
        let mut target = None;
        for state in &self.state {
            if let Some(attributes) = state.downcast_ref::<AttributeState>() {
                let found = attributes.get(name).is_some();
                target = Some(state.clone());
                if found {
                    break;
                }
            }
        }

        let target = match target {
            Some(t) => t,
            None => {
                let state = ObjectPtr::new(AttributeState::new());
                self.add_state(state.clone())?;
                state
            }
        };
        let mut attributes = target
            .downcast_mut::<AttributeState>()
            .ok_or_else(|| Error::other("attribute state changed type"))?;
        attributes.set(name, value);
        Ok(())
    }

    pub fn children(&self) -> &[ObjectPtr] {
        &self.children
    }

    pub fn parent(&self) -> Option<ObjectPtr> {
        self.parent.upgrade()
    }

    /// Append `child` to `group`, first removing it from any previous parent.
    pub fn add_child(group: &ObjectPtr, child: ObjectPtr) -> Result<()> {
        expect_group(group)?;
        {
            let guard = child.read();
            if guard.as_visible_renderable().is_none() {
                return Err(Error::type_mismatch("VisibleRenderable", guard.type_name()));
            }
        }
        if Self::is_self_or_ancestor(&child, group) {
            return Err(Error::argument("Cannot add a Group to itself or its descendants."));
        }

        let old_parent = child.downcast_ref::<Group>().and_then(|g| g.parent());
        if let Some(old) = old_parent {
            Self::remove_child(&old, &child)?;
        }

        if let Some(mut g) = group.downcast_mut::<Group>() {
            g.children.push(child.clone());
        }
        if let Some(mut c) = child.downcast_mut::<Group>() {
            c.parent = group.downgrade();
        }
        Ok(())
    }

    /// Remove `child` from `group`, failing with [`Error::NotAChild`] if it is
    /// not one of its children.
    pub fn remove_child(group: &ObjectPtr, child: &ObjectPtr) -> Result<()> {
        expect_group(group)?;
        {
            let mut g = group
                .downcast_mut::<Group>()
                .ok_or_else(|| Error::type_mismatch(GROUP.name, "Object"))?;
            let index = g
                .children
                .iter()
                .position(|c| c.ptr_eq(child))
                .ok_or(Error::NotAChild)?;
            g.children.remove(index);
        }
        if let Some(mut c) = child.downcast_mut::<Group>() {
            c.parent = WeakObjectPtr::new();
        }
        Ok(())
    }

    /// Remove every child, clearing their parent links.
    pub fn clear_children(group: &ObjectPtr) -> Result<()> {
        expect_group(group)?;
        let children = match group.downcast_mut::<Group>() {
            Some(mut g) => std::mem::take(&mut g.children),
            None => Vec::new(),
        };
        for child in &children {
            if let Some(mut c) = child.downcast_mut::<Group>() {
                c.parent = WeakObjectPtr::new();
            }
        }
        Ok(())
    }

    // True when `candidate` is `group` or one of its ancestors.
    fn is_self_or_ancestor(candidate: &ObjectPtr, group: &ObjectPtr) -> bool {
        let mut current = Some(group.clone());
        while let Some(g) = current {
            if g.ptr_eq(candidate) {
                return true;
            }
            current = g.downcast_ref::<Group>().and_then(|g| g.parent());
        }
        false
    }

    fn render_state(&self, renderer: &mut dyn Renderer) -> Result<()> {
        for state in &self.state {
            super::render(state, renderer)?;
        }
        Ok(())
    }

    fn render_children(&self, renderer: &mut dyn Renderer) -> Result<()> {
        for child in &self.children {
            super::render(child, renderer)?;
        }
        Ok(())
    }

    /// Render optionally without the enclosing attribute scope.
    pub fn render_in(&self, renderer: &mut dyn Renderer, in_attribute_block: bool) -> Result<()> {
        let mut scope = AttributeBlock::conditional(renderer, in_attribute_block)?;
        if let Some(t) = &self.transform {
            super::render(t, &mut *scope)?;
        }
        self.render_state(&mut *scope)?;
        self.render_children(&mut *scope)?;
        scope.end()
    }
}

impl VisibleRenderable for Group {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        self.render_in(renderer, true)
    }

    fn bound(&self) -> Box3f {
        let mut result = Box3f::EMPTY;
        for child in &self.children {
            if let Some(b) = super::bound(child) {
                result.expand_by_box(&b);
            }
        }
        result.transformed(&self.transform_matrix(0.0))
    }
}

fn save_list(items: &[ObjectPtr], ctx: &mut SaveContext<'_>, container: &IndexedIoPtr, entry: &str) -> Result<()> {
    let dir = container.create_subdirectory(entry)?;
    for (i, item) in items.iter().enumerate() {
        ctx.save(item, &dir, &i.to_string())?;
    }
    Ok(())
}

// Entries load in numeric order; non-numeric names sort last by name.
fn sorted_entries(dir: &IndexedIoPtr) -> Vec<InternedString> {
    let mut ids = dir.entry_ids();
    ids.sort_by_key(|id| (id.parse::<u64>().unwrap_or(u64::MAX), id.clone()));
    ids
}

impl Object for Group {
    object_accessors!(GROUP);

    fn copy_from(&mut self, other: &dyn Object, ctx: &mut CopyContext) -> Result<()> {
        let other = object::expect_type::<Self>(&GROUP, other)?;
        self.transform = other.transform.as_ref().map(|t| ctx.copy(t)).transpose()?;
        self.state = other
            .state
            .iter()
            .map(|s| ctx.copy(s))
            .collect::<Result<_>>()?;

        let this = ctx.current_target();
        self.children.clear();
        for child in &other.children {
            let copy = ctx.copy(child)?;
            if let Some(mut g) = copy.downcast_mut::<Group>() {
                g.parent = this.clone();
            }
            self.children.push(copy);
        }
        Ok(())
    }

    fn is_equal_to(&self, other: &dyn Object) -> bool {
        if !object::is_equal_to(self, other) {
            return false;
        }
        let Some(o) = other.downcast_ref::<Self>() else {
            return false;
        };
        object::option_ptr_eq(&self.transform, &o.transform)
            && self.state.len() == o.state.len()
            && self.state.iter().zip(&o.state).all(|(a, b)| a.is_equal_to(b))
            && self.children.len() == o.children.len()
            && self.children.iter().zip(&o.children).all(|(a, b)| a.is_equal_to(b))
    }

    fn hash(&self, h: &mut MurmurHash) {
        object::hash(self, h);
        if let Some(t) = &self.transform {
            t.read().hash(h);
        }
        for s in &self.state {
            s.read().hash(h);
        }
        for c in &self.children {
            c.read().hash(h);
        }
    }

    fn memory_usage(&self, acc: &mut MemoryAccumulator) {
        object::memory_usage(acc);
        acc.accumulate((self.state.len() + self.children.len()) * size_of::<ObjectPtr>());
        for p in self.transform.iter().chain(&self.state).chain(&self.children) {
            acc.accumulate_object(p);
        }
    }

    fn save(&self, ctx: &mut SaveContext<'_>) -> Result<()> {
        let container = ctx.container(GROUP.name, IO_VERSION)?;
        if let Some(t) = &self.transform {
            ctx.save(t, &container, TRANSFORM_ENTRY)?;
        }
        save_list(&self.state, ctx, &container, STATE_ENTRY)?;
        save_list(&self.children, ctx, &container, CHILDREN_ENTRY)
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut version = IO_VERSION;
        let container = ctx.container(GROUP.name, &mut version)?;

        self.transform = None;
        if container.has_entry(TRANSFORM_ENTRY) {
            let transform = ctx.load(&container, TRANSFORM_ENTRY)?;
            self.set_transform(Some(transform))?;
        }

        self.state.clear();
        let state_dir = container.subdirectory(STATE_ENTRY)?;
        for name in sorted_entries(&state_dir) {
            let state = ctx.load(&state_dir, &name)?;
            self.add_state(state)?;
        }

        let this = ctx.current_target();
        self.children.clear();
        let children_dir = container.subdirectory(CHILDREN_ENTRY)?;
        for name in sorted_entries(&children_dir) {
            let child = ctx.load(&children_dir, &name)?;
            {
                let guard = child.read();
                if guard.as_visible_renderable().is_none() {
                    return Err(Error::type_mismatch("VisibleRenderable", guard.type_name()));
                }
            }
            if let Some(mut g) = child.downcast_mut::<Group>() {
                g.parent = this.clone();
            }
            self.children.push(child);
        }
        Ok(())
    }

    fn as_visible_renderable(&self) -> Option<&dyn VisibleRenderable> {
        Some(self)
    }
}

impl ObjectType for Group {
    fn static_description() -> &'static TypeDescription {
        &GROUP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IntData;
    use crate::io::MemoryIndexedIo;
    use crate::render::{MatrixTransform, RecordingRenderer, RenderCall};
    use crate::util::Vec3;

    fn group() -> ObjectPtr {
        ObjectPtr::new(Group::new())
    }

    fn children(g: &ObjectPtr) -> Vec<ObjectPtr> {
        g.downcast_ref::<Group>().unwrap().children().to_vec()
    }

    #[test]
    fn test_reparenting() {
        let p1 = group();
        let p2 = group();
        let g = group();

        Group::add_child(&p1, g.clone()).unwrap();
        assert!(g.downcast_ref::<Group>().unwrap().parent().unwrap().ptr_eq(&p1));

        Group::add_child(&p2, g.clone()).unwrap();
        assert!(children(&p1).is_empty());
        let c2 = children(&p2);
        assert_eq!(c2.len(), 1);
        assert!(c2[0].ptr_eq(&g));
        assert!(g.downcast_ref::<Group>().unwrap().parent().unwrap().ptr_eq(&p2));
    }

    #[test]
    fn test_remove_child() {
        let p = group();
        let g = group();
        Group::add_child(&p, g.clone()).unwrap();
        Group::remove_child(&p, &g).unwrap();
        assert!(g.downcast_ref::<Group>().unwrap().parent().is_none());
        assert!(matches!(Group::remove_child(&p, &g), Err(Error::NotAChild)));
    }

    #[test]
    fn test_rejects_cycles_and_non_renderables() {
        let p = group();
        let g = group();
        Group::add_child(&p, g.clone()).unwrap();
        assert!(matches!(Group::add_child(&g, p.clone()), Err(Error::InvalidArgument(_))));
        assert!(matches!(Group::add_child(&p, p.clone()), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            Group::add_child(&p, ObjectPtr::new(IntData::new(1))),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_state_rejects_transform() {
        let mut g = Group::new();
        let t = ObjectPtr::new(MatrixTransform::default());
        assert!(matches!(g.add_state(t.clone()), Err(Error::InvalidArgument(_))));
        g.set_transform(Some(t)).unwrap();
        assert!(g.set_transform(Some(ObjectPtr::new(Group::new()))).is_err());
    }

    #[test]
    fn test_attributes_inherit_from_parent() {
        let parent = group();
        let child = group();
        Group::add_child(&parent, child.clone()).unwrap();

        let value = ObjectPtr::new(IntData::new(3));
        parent
            .downcast_mut::<Group>()
            .unwrap()
            .set_attribute("level", &value)
            .unwrap();

        let found = child.downcast_ref::<Group>().unwrap().get_attribute("level").unwrap();
        assert!(found.is_equal_to(&value));
        assert!(!found.ptr_eq(&value));
        assert!(child.downcast_ref::<Group>().unwrap().get_attribute("other").is_none());
    }

    #[test]
    fn test_global_transform() {
        let parent = group();
        let child = group();
        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_scale(Vec3::splat(2.0));
        parent
            .downcast_mut::<Group>()
            .unwrap()
            .set_transform(Some(ObjectPtr::new(MatrixTransform::new(a))))
            .unwrap();
        child
            .downcast_mut::<Group>()
            .unwrap()
            .set_transform(Some(ObjectPtr::new(MatrixTransform::new(b))))
            .unwrap();
        Group::add_child(&parent, child.clone()).unwrap();

        let global = child.downcast_ref::<Group>().unwrap().global_transform_matrix(0.0);
        assert_eq!(global, a * b);
    }

    #[test]
    fn test_render_order() {
        let root = group();
        let child = group();
        root.downcast_mut::<Group>()
            .unwrap()
            .set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::IDENTITY))))
            .unwrap();
        root.downcast_mut::<Group>()
            .unwrap()
            .set_attribute("a", &ObjectPtr::new(IntData::new(1)))
            .unwrap();
        Group::add_child(&root, child).unwrap();

        let mut r = RecordingRenderer::new();
        crate::render::render(&root, &mut r).unwrap();
        assert_eq!(
            r.calls,
            [
                RenderCall::AttributeBegin,
                RenderCall::ConcatTransform(Mat4::IDENTITY),
                RenderCall::SetAttribute("a".into()),
                RenderCall::AttributeBegin,
                RenderCall::AttributeEnd,
                RenderCall::AttributeEnd,
            ]
        );
    }

    #[test]
    fn test_copy_and_round_trip_restore_parents() {
        let root = group();
        let child = group();
        Group::add_child(&root, child).unwrap();

        let copy = root.copy().unwrap();
        assert!(copy.is_equal_to(&root));
        let copied_child = children(&copy)[0].clone();
        assert!(copied_child.downcast_ref::<Group>().unwrap().parent().unwrap().ptr_eq(&copy));

        let io = MemoryIndexedIo::create();
        root.save(&io, "root").unwrap();
        let loaded = ObjectPtr::load(&io, "root").unwrap();
        assert!(loaded.is_equal_to(&root));
        let loaded_child = children(&loaded)[0].clone();
        assert!(loaded_child.downcast_ref::<Group>().unwrap().parent().unwrap().ptr_eq(&loaded));
    }

    #[test]
    fn test_numeric_entry_order() {
        let io = MemoryIndexedIo::create();
        let dir = io.create_subdirectory("d").unwrap();
        for name in ["10", "2", "1"] {
            dir.write_value(name, 0i32).unwrap();
        }
        let names: Vec<_> = sorted_entries(&dir).iter().map(|n| n.to_string()).collect();
        assert_eq!(names, ["1", "2", "10"]);
    }
}
